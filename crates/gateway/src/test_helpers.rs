//! # テスト用共通ヘルパー
//!
//! 署名生成、フェイク証明エンジン、テスト用Gatewayの起動。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use zvan_crypto::{personal_message_hash, sign_digest, SigningKey};
use zvan_types::SubmitRequest;

use crate::config::{GatewayConfig, GatewayState};
use crate::storage::MappingStore;

pub const TEST_SECRET: &[u8] = b"test-server-secret";

/// 全バイトが`byte`の秘密鍵
pub fn signing_key(byte: u8) -> SigningKey {
    SigningKey::from_slice(&[byte; 32]).unwrap()
}

pub fn address_of(key: &SigningKey) -> String {
    zvan_crypto::address_of(key.verifying_key()).to_string()
}

/// EIP-191署名（`0x`付きHex）
pub fn sign_personal(key: &SigningKey, message: &str) -> String {
    sign_digest(key, &personal_message_hash(message.as_bytes()))
        .unwrap()
        .to_hex()
}

/// 正しく署名された提出リクエスト
pub fn signed_request(key: &SigningKey, nonce: &str) -> SubmitRequest {
    let message = format!("zvan submission {nonce}");
    SubmitRequest {
        address: Some(address_of(key)),
        signature: Some(sign_personal(key, &message)),
        message: Some(message),
        patient_data: Some(serde_json::json!({
            "name": "Jane Doe",
            "zip_code": "12345",
            "birth_year": 1980,
        })),
        nonce: Some(nonce.to_string()),
    }
}

/// 実行可能なシェルスクリプトを書き出す。
#[cfg(unix)]
pub fn write_engine_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// 入力ファイルの内容に`host_token`を前置してレシートとして書き出すエンジン
pub const ECHO_ENGINE: &str = "printf 'receipt:%s:' \"$2\" > \"$3\"\ncat \"$1\" >> \"$3\"\n";

/// 常に終了コード1で失敗するエンジン
pub const FAILING_ENGINE: &str = "echo partial > \"$3\"\nexit 1\n";

/// `dir`配下にステージング・レシートディレクトリを置くテスト設定
pub fn test_config(dir: &Path, engine_path: PathBuf) -> GatewayConfig {
    GatewayConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        server_secret: TEST_SECRET.to_vec(),
        db_path: dir.join("zvan.db"),
        engine_path,
        staging_dir: dir.join("staging"),
        receipt_dir: dir.join("receipts"),
        engine_timeout: Duration::from_secs(10),
        engine_max_concurrency: 2,
        record_ttl: None,
        max_body_bytes: 64 * 1024,
    }
}

pub fn test_state(config: &GatewayConfig, store: Arc<dyn MappingStore>) -> Arc<GatewayState> {
    Arc::new(GatewayState::new(config, store).unwrap())
}

/// テスト用Gatewayを起動し、ベースURLを返す。
pub async fn start_gateway(state: Arc<GatewayState>, max_body_bytes: usize) -> String {
    let app = crate::endpoints::router(state, max_body_bytes);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

/// ディレクトリ内のエントリ数（存在しなければ0）
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
