//! # Mapping Store
//!
//! host_tokenをキーとしてマッピングレコードを保持する永続ストアの抽象インターフェース。
//! SQLite実装は `sqlite` サブモジュール、メモリ内実装は `memory` サブモジュールを参照。
//!
//! ## 不変条件
//! - host_tokenあたりのレコードは常に高々1件（`put`は上書き）
//! - 読み取り側からは旧レコードか新レコードのどちらかのみが観測される
//! - `put`完了後に発行された`get`は新レコードを返す

pub mod memory;
#[cfg(feature = "store-sqlite")]
pub mod sqlite;

pub use memory::MemoryMappingStore;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteMappingStore;

use zvan_types::MappingRecord;

/// ストア操作のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// バックエンドの操作に失敗
    #[error("ストレージ操作に失敗: {0}")]
    Backend(String),
}

/// マッピングストアの抽象インターフェース。
///
/// 提出ごとに触れるキーは1つだけなので、キー単位の書き込み直列化のみを要求する。
#[async_trait::async_trait]
pub trait MappingStore: Send + Sync {
    /// host_tokenをキーにレコードをupsertする。置き換えたレコードがあれば返す。
    async fn put(&self, record: MappingRecord) -> Result<Option<MappingRecord>, StoreError>;

    /// host_tokenに対応するレコードを取得する。
    async fn get(&self, host_token: &str) -> Result<Option<MappingRecord>, StoreError>;

    /// `created_at`が`cutoff_millis`より前のレコードを削除し、削除したレコードを返す。
    async fn purge_created_before(
        &self,
        cutoff_millis: i64,
    ) -> Result<Vec<MappingRecord>, StoreError>;
}
