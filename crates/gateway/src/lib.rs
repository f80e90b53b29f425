//! # Zvan Gateway
//!
//! 署名付き提出を受け付け、外部の証明エンジンでレシートを生成し、
//! host_tokenをキーにレシートを返すGateway。
//!
//! ## API エンドポイント
//! - `POST /submit`: 提出（認証 → host_token導出 → 証明エンジン実行 → コミット）
//! - `GET /receipt/{host_token}`: レシート取得
//! - `GET /health`: 死活確認

mod auth;
pub mod config;
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod receipt;
pub mod service;
pub mod storage;

#[cfg(test)]
mod test_helpers;
