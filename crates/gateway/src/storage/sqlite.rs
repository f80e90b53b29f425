//! # SQLite Mapping Store
//!
//! `mappings`テーブル1つにレコードを保持する。upsertは`INSERT OR REPLACE`。
//! 接続はMutexで直列化し、ブロッキングスレッド上で操作する。

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};
use zvan_types::MappingRecord;

use super::{MappingStore, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS mappings (
    host_token TEXT PRIMARY KEY,
    address TEXT NOT NULL,
    nonce TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    receipt_path TEXT NOT NULL
)";

const SELECT_COLUMNS: &str = "SELECT host_token, address, nonce, created_at, receipt_path FROM mappings";

/// SQLiteによるMappingStore実装。
pub struct SqliteMappingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMappingStore {
    /// DBファイルを開く（存在しなければ作成する）。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(backend)?;
        Self::init(conn)
    }

    /// メモリ内DBを開く。
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("SQLite接続のロックが破損しています".to_string()))?;
            f(&mut guard).map_err(backend)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("ブロッキングタスクの実行に失敗: {e}")))?
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MappingRecord> {
    Ok(MappingRecord {
        host_token: row.get(0)?,
        address: row.get(1)?,
        nonce: row.get(2)?,
        created_at: row.get(3)?,
        receipt_path: row.get(4)?,
    })
}

#[async_trait::async_trait]
impl MappingStore for SqliteMappingStore {
    async fn put(&self, record: MappingRecord) -> Result<Option<MappingRecord>, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let previous = tx
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE host_token = ?1"),
                    params![record.host_token],
                    row_to_record,
                )
                .optional()?;
            tx.execute(
                "INSERT OR REPLACE INTO mappings (host_token, address, nonce, created_at, receipt_path)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.host_token,
                    record.address,
                    record.nonce,
                    record.created_at,
                    record.receipt_path
                ],
            )?;
            tx.commit()?;
            Ok(previous)
        })
        .await
    }

    async fn get(&self, host_token: &str) -> Result<Option<MappingRecord>, StoreError> {
        let host_token = host_token.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE host_token = ?1"),
                params![host_token],
                row_to_record,
            )
            .optional()
        })
        .await
    }

    async fn purge_created_before(
        &self,
        cutoff_millis: i64,
    ) -> Result<Vec<MappingRecord>, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut stmt = tx.prepare(&format!(
                "{SELECT_COLUMNS} WHERE created_at < ?1 ORDER BY created_at"
            ))?;
            let expired = stmt
                .query_map(params![cutoff_millis], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            drop(stmt);
            tx.execute(
                "DELETE FROM mappings WHERE created_at < ?1",
                params![cutoff_millis],
            )?;
            tx.commit()?;
            Ok(expired)
        })
        .await
    }
}
