//! # メモリ内 Mapping Store
//!
//! 開発・テスト環境用。プロセス終了でレコードは失われる。

use std::collections::HashMap;

use tokio::sync::RwLock;
use zvan_types::MappingRecord;

use super::{MappingStore, StoreError};

/// `RwLock<HashMap>`によるMappingStore実装。
#[derive(Default)]
pub struct MemoryMappingStore {
    records: RwLock<HashMap<String, MappingRecord>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保持しているレコード数
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl MappingStore for MemoryMappingStore {
    async fn put(&self, record: MappingRecord) -> Result<Option<MappingRecord>, StoreError> {
        let mut records = self.records.write().await;
        Ok(records.insert(record.host_token.clone(), record))
    }

    async fn get(&self, host_token: &str) -> Result<Option<MappingRecord>, StoreError> {
        Ok(self.records.read().await.get(host_token).cloned())
    }

    async fn purge_created_before(
        &self,
        cutoff_millis: i64,
    ) -> Result<Vec<MappingRecord>, StoreError> {
        let mut records = self.records.write().await;
        let expired: Vec<String> = records
            .values()
            .filter(|r| r.created_at < cutoff_millis)
            .map(|r| r.host_token.clone())
            .collect();
        Ok(expired
            .iter()
            .filter_map(|token| records.remove(token))
            .collect())
    }
}
