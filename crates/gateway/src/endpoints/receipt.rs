//! # GET /receipt/{host_token}
//!
//! 記録済みのレシートをバイナリストリームで返す。

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use tokio_util::io::ReaderStream;

use crate::config::GatewayState;
use crate::error::GatewayError;

/// GET /receipt/{host_token}: レシート取得。
pub async fn handle_receipt(
    State(state): State<Arc<GatewayState>>,
    Path(host_token): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let receipt = state.receipts.fetch(&host_token).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(receipt.file)),
    ))
}
