//! # 提出処理
//!
//! 1. 必須フィールドの検証
//! 2. 署名による提出者認証
//! 3. host_tokenの導出
//! 4. 提出ペイロードの一時配置（全ての経路で削除される）
//! 5. 証明エンジンの実行
//! 6. 成功時のみマッピングレコードをコミット
//!
//! 検証・認証の失敗はファイルシステムにもエンジンにも触れる前に返す。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use zvan_crypto::{CryptoError, HostTokenKey};
use zvan_types::{MappingRecord, SubmitRequest, SubmitResponse};

use crate::auth::authenticate_submitter;
use crate::engine::{EngineInvocation, ProofEngine};
use crate::error::GatewayError;
use crate::storage::MappingStore;

/// 検証済みの提出内容
struct ValidatedSubmission {
    address: String,
    signature: String,
    message: String,
    patient_data: serde_json::Value,
    nonce: String,
}

fn validate(request: SubmitRequest) -> Result<ValidatedSubmission, GatewayError> {
    fn present(field: Option<String>) -> Result<String, GatewayError> {
        field
            .filter(|s| !s.is_empty())
            .ok_or(GatewayError::MissingFields)
    }

    Ok(ValidatedSubmission {
        address: present(request.address)?,
        signature: present(request.signature)?,
        message: present(request.message)?,
        patient_data: request
            .patient_data
            .filter(|v| !v.is_null())
            .ok_or(GatewayError::MissingFields)?,
        nonce: present(request.nonce)?,
    })
}

/// 一時配置した入力ファイル。破棄時に削除する。
struct StagedInput {
    path: PathBuf,
}

impl StagedInput {
    async fn write(staging_dir: &Path, payload: &serde_json::Value) -> Result<Self, GatewayError> {
        tokio::fs::create_dir_all(staging_dir).await.map_err(|e| {
            GatewayError::Internal(format!("ステージングディレクトリの作成に失敗: {e}"))
        })?;
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| GatewayError::Internal(format!("ペイロードのシリアライズに失敗: {e}")))?;

        // 書き込み途中で失敗しても削除されるよう、書き込み前にガードを作る
        let staged = Self {
            path: staging_dir.join(format!("patient_{}.json", uuid::Uuid::new_v4())),
        };
        tokio::fs::write(&staged.path, bytes).await.map_err(|e| {
            GatewayError::Internal(format!("ペイロードの一時配置に失敗: {e}"))
        })?;
        Ok(staged)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedInput {
    fn drop(&mut self) {
        remove_file_quietly(&self.path);
    }
}

/// コミット前のレシート出力先。
///
/// マッピングをコミットするまでは破棄時に削除する。エンジン失敗、ストア書き込み失敗、
/// 提出処理のFutureの途中破棄（クライアント切断等）のいずれでも出力が残らない。
struct PendingReceipt {
    path: PathBuf,
    committed: bool,
}

impl PendingReceipt {
    fn new(receipt_dir: &Path) -> Self {
        Self {
            path: receipt_dir.join(format!("receipt_{}.bin", uuid::Uuid::new_v4())),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// コミット済みとして削除対象から外す。
    fn keep(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingReceipt {
    fn drop(&mut self) {
        if !self.committed {
            remove_file_quietly(&self.path);
        }
    }
}

fn remove_file_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ファイルの削除に失敗");
        }
    }
}

/// 成果物ファイルを削除する。存在しない場合は何もしない。
pub(crate) async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "成果物の削除に失敗");
        }
    }
}

/// 現在時刻（Unixミリ秒）
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// 提出処理サービス。
pub struct SubmissionService {
    token_key: HostTokenKey,
    engine: ProofEngine,
    store: Arc<dyn MappingStore>,
    staging_dir: PathBuf,
    receipt_dir: PathBuf,
}

impl SubmissionService {
    pub fn new(
        server_secret: &[u8],
        engine: ProofEngine,
        store: Arc<dyn MappingStore>,
        staging_dir: PathBuf,
        receipt_dir: PathBuf,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            token_key: HostTokenKey::new(server_secret)?,
            engine,
            store,
            staging_dir,
            receipt_dir,
        })
    }

    /// 提出を処理し、host_tokenとレシートの保存先を返す。
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, GatewayError> {
        let submission = validate(request)?;
        authenticate_submitter(&submission.address, &submission.message, &submission.signature)?;

        let host_token = self.token_key.derive(&submission.address, &submission.nonce);
        tracing::info!(host_token = %host_token, "提出を受理");

        let staged = StagedInput::write(&self.staging_dir, &submission.patient_data).await?;

        tokio::fs::create_dir_all(&self.receipt_dir).await.map_err(|e| {
            GatewayError::Internal(format!("レシートディレクトリの作成に失敗: {e}"))
        })?;
        let pending = PendingReceipt::new(&self.receipt_dir);

        self.engine
            .run(EngineInvocation {
                input_path: staged.path(),
                host_token: &host_token,
                output_path: pending.path(),
            })
            .await?;
        drop(staged);

        let record = MappingRecord {
            host_token: host_token.clone(),
            address: submission.address,
            nonce: submission.nonce,
            created_at: now_millis(),
            receipt_path: pending.path().to_string_lossy().into_owned(),
        };
        let receipt_path = record.receipt_path.clone();

        let replaced = self.store.put(record).await?;
        pending.keep();

        if let Some(previous) = replaced.filter(|p| p.receipt_path != receipt_path) {
            tracing::info!(
                host_token = %host_token,
                path = %previous.receipt_path,
                "置き換えられた旧レシートを削除"
            );
            remove_artifact(Path::new(&previous.receipt_path)).await;
        }

        tracing::info!(host_token = %host_token, path = %receipt_path, "マッピングをコミット");
        Ok(SubmitResponse {
            ok: true,
            host_token,
            receipt_path,
        })
    }
}
