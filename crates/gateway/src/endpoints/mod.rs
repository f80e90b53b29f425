//! # Gatewayエンドポイント
//!
//! - `POST /submit`: 提出処理
//! - `GET /receipt/{host_token}`: レシート取得
//! - `GET /health`: 死活確認

pub mod health;
pub mod receipt;
pub mod submit;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;

pub use health::handle_health;
pub use receipt::handle_receipt;
pub use submit::handle_submit;

use crate::config::GatewayState;

/// Gatewayのルーターを構築する。
pub fn router(state: Arc<GatewayState>, max_body_bytes: usize) -> axum::Router {
    axum::Router::new()
        .route("/submit", axum::routing::post(handle_submit))
        .route("/receipt/{host_token}", axum::routing::get(handle_receipt))
        .route("/health", axum::routing::get(handle_health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
