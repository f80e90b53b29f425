//! # レシート取得
//!
//! host_tokenからマッピングレコードを引き、記録済みのレシートを返す。
//! 読み出すパスは常に提出処理が生成・記録したものであり、
//! クライアントが与えた値からパスを組み立てることはない。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use zvan_types::MappingRecord;

use crate::error::GatewayError;
use crate::service::{now_millis, remove_artifact};
use crate::storage::MappingStore;

/// 取得したレシート。ファイルは開いた状態で返す。
pub struct Receipt {
    pub record: MappingRecord,
    pub file: tokio::fs::File,
}

/// レシート取得サービス。
pub struct ReceiptRetrieval {
    store: Arc<dyn MappingStore>,
    record_ttl: Option<Duration>,
}

impl ReceiptRetrieval {
    pub fn new(store: Arc<dyn MappingStore>, record_ttl: Option<Duration>) -> Self {
        Self { store, record_ttl }
    }

    /// 保持期間の下限（Unixミリ秒）。無期限の場合はNone。
    fn cutoff_millis(&self) -> Option<i64> {
        self.record_ttl.map(|ttl| {
            let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            now_millis().saturating_sub(ttl_millis)
        })
    }

    /// 保持期間内のレコードを引く。
    async fn live_record(&self, host_token: &str) -> Result<MappingRecord, GatewayError> {
        let record = self
            .store
            .get(host_token)
            .await?
            .ok_or(GatewayError::NotFound)?;

        if let Some(cutoff) = self.cutoff_millis() {
            if record.created_at < cutoff {
                tracing::debug!(host_token = %host_token, "保持期間切れのレコード");
                return Err(GatewayError::NotFound);
            }
        }
        Ok(record)
    }

    pub async fn fetch(&self, host_token: &str) -> Result<Receipt, GatewayError> {
        let record = self.live_record(host_token).await?;
        if let Some(file) = open_receipt(&record).await? {
            return Ok(Receipt { record, file });
        }

        // 再提出で置き換えられ旧レシートが削除された場合は、新しいレコードで1度だけ再試行する
        let current = self.live_record(host_token).await?;
        if current.receipt_path != record.receipt_path {
            if let Some(file) = open_receipt(&current).await? {
                return Ok(Receipt {
                    record: current,
                    file,
                });
            }
        }

        tracing::warn!(
            host_token = %host_token,
            path = %current.receipt_path,
            "レコードに対応するレシートが存在しません"
        );
        Err(GatewayError::NotFound)
    }

    /// 保持期間切れのレコードとそのレシートを削除し、削除件数を返す。
    pub async fn purge_expired(&self) -> Result<usize, GatewayError> {
        let Some(cutoff) = self.cutoff_millis() else {
            return Ok(0);
        };
        let purged = self.store.purge_created_before(cutoff).await?;
        for record in &purged {
            remove_artifact(Path::new(&record.receipt_path)).await;
        }
        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "保持期間切れのレコードを削除");
        }
        Ok(purged.len())
    }
}

/// レシートを開く。ファイルが存在しなければNone。
async fn open_receipt(record: &MappingRecord) -> Result<Option<tokio::fs::File>, GatewayError> {
    match tokio::fs::File::open(Path::new(&record.receipt_path)).await {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GatewayError::Internal(format!(
            "レシートの読み込みに失敗: {e}"
        ))),
    }
}
