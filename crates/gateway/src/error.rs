//! # Gateway エラー型
//!
//! 全エンドポイントで共通のエラー型。レスポンスボディは常に
//! `{"error": ..., "code": ...}` 形式のJSON（`code`は証明エンジンの終了コードがある場合のみ）。

use axum::http::StatusCode;
use axum::Json;
use zvan_types::ErrorBody;

use crate::engine::EngineError;
use crate::storage::StoreError;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 必須フィールドの欠落
    #[error("missing fields")]
    MissingFields,
    /// 不正なリクエスト（JSONパース失敗等）
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// リクエストボディが上限を超過
    #[error("リクエストボディが上限を超えています")]
    PayloadTooLarge,
    /// 署名者と主張アドレスの不一致
    #[error("invalid signature")]
    InvalidSignature,
    /// 証明エンジンの失敗（非ゼロ終了、起動失敗、タイムアウト）
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// 未知のhost_token
    #[error("not found")]
    NotFound,
    /// ストレージ操作に失敗
    #[error(transparent)]
    Storage(#[from] StoreError),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingFields
            | GatewayError::BadRequest(_)
            | GatewayError::InvalidSignature => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Engine(_) | GatewayError::Storage(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        let code = match self {
            GatewayError::Engine(EngineError::Exited { code }) => *code,
            _ => None,
        };
        ErrorBody {
            error: self.to_string(),
            code,
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match &self {
            GatewayError::Storage(_) | GatewayError::Internal(_) => {
                tracing::error!(error = %self, "リクエスト処理中に内部エラーが発生");
            }
            GatewayError::Engine(_) => {
                tracing::warn!(error = %self, "証明エンジンが失敗");
            }
            _ => {}
        }
        (status, Json(self.body())).into_response()
    }
}
