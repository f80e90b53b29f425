//! # POST /submit
//!
//! 署名付きの提出を受け付け、証明エンジンの完了後にhost_tokenを返す。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use zvan_types::{SubmitRequest, SubmitResponse};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /submit: 提出処理。
///
/// JSONとして解釈できないボディは400、上限超過は413として返す。
pub async fn handle_submit(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, GatewayError> {
    let Json(request) = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge
        } else {
            GatewayError::BadRequest(rejection.body_text())
        }
    })?;

    let response = state.submissions.submit(request).await?;
    Ok(Json(response))
}
