//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 設定は起動時に一度だけ読み込み、以降は不変のまま各コンポーネントに注入する。
//! リクエスト処理中に環境変数を参照することはない。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use zvan_crypto::CryptoError;

use crate::engine::ProofEngine;
use crate::receipt::ReceiptRetrieval;
use crate::service::SubmissionService;
use crate::storage::MappingStore;

/// 証明エンジンのタイムアウト既定値（秒）
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 600;

/// 同時に実行できる証明エンジンプロセス数の既定値
pub const DEFAULT_ENGINE_MAX_CONCURRENCY: usize = 4;

/// レコード保持期間の上限（秒）。ミリ秒でi64に収まる範囲。
pub const MAX_RECORD_TTL_SECS: u64 = i64::MAX as u64 / 1000;

/// リクエストボディの最大サイズ既定値（2MB）
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Gatewayの設定。
///
/// サーバー秘密鍵を含むため`Debug`は実装しない。
pub struct GatewayConfig {
    /// 待ち受けアドレス
    pub listen_addr: String,
    /// host_token導出用のサーバー秘密鍵（必須、既定値なし）
    pub server_secret: Vec<u8>,
    /// マッピングDBのパス
    pub db_path: PathBuf,
    /// 証明エンジンの実行ファイル
    pub engine_path: PathBuf,
    /// 提出ペイロードの一時配置ディレクトリ
    pub staging_dir: PathBuf,
    /// レシートの保存ディレクトリ
    pub receipt_dir: PathBuf,
    /// 証明エンジン1回あたりの実行時間上限
    pub engine_timeout: Duration,
    /// 同時実行できる証明エンジンプロセス数
    pub engine_max_concurrency: usize,
    /// マッピングレコードの保持期間。Noneの場合は無期限。
    pub record_ttl: Option<Duration>,
    /// リクエストボディの最大サイズ（バイト）
    pub max_body_bytes: usize,
}

impl GatewayConfig {
    /// プロセスの環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から構築する。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let server_secret = lookup("ZVAN_SERVER_SECRET")
            .filter(|s| !s.is_empty())
            .context("ZVAN_SERVER_SECRETが設定されていません")?
            .into_bytes();

        let listen_addr =
            lookup("ZVAN_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let db_path = PathBuf::from(lookup("ZVAN_DB_PATH").unwrap_or_else(|| "zvan.db".to_string()));
        let engine_path = PathBuf::from(
            lookup("ZVAN_ENGINE_PATH")
                .unwrap_or_else(|| "../zvan-host/target/debug/zvan-host".to_string()),
        );
        let staging_dir = absolutize(Path::new(
            &lookup("ZVAN_STAGING_DIR").unwrap_or_else(|| "./staging".to_string()),
        ))?;
        let receipt_dir = absolutize(Path::new(
            &lookup("ZVAN_RECEIPT_DIR").unwrap_or_else(|| "./receipts".to_string()),
        ))?;

        let engine_timeout = Duration::from_secs(
            parse_var(&lookup, "ZVAN_ENGINE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_ENGINE_TIMEOUT_SECS),
        );
        let engine_max_concurrency = parse_var(&lookup, "ZVAN_ENGINE_MAX_CONCURRENCY")?
            .unwrap_or(DEFAULT_ENGINE_MAX_CONCURRENCY);
        if engine_max_concurrency == 0 {
            anyhow::bail!("ZVAN_ENGINE_MAX_CONCURRENCYは1以上である必要があります");
        }
        let record_ttl = match parse_var::<u64>(&lookup, "ZVAN_RECORD_TTL_SECS")? {
            Some(0) => anyhow::bail!("ZVAN_RECORD_TTL_SECSは1以上である必要があります"),
            Some(secs) if secs > MAX_RECORD_TTL_SECS => anyhow::bail!(
                "ZVAN_RECORD_TTL_SECSが上限（{MAX_RECORD_TTL_SECS}秒）を超えています"
            ),
            other => other.map(Duration::from_secs),
        };
        let max_body_bytes =
            parse_var(&lookup, "ZVAN_MAX_BODY_BYTES")?.unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self {
            listen_addr,
            server_secret,
            db_path,
            engine_path,
            staging_dir,
            receipt_dir,
            engine_timeout,
            engine_max_concurrency,
            record_ttl,
            max_body_bytes,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key}の値が不正です: {raw}"))
        })
        .transpose()
}

/// 相対パスをカレントディレクトリ基準の絶対パスにする。
fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("カレントディレクトリの取得に失敗")?;
    Ok(cwd.join(path))
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// 提出処理（認証・host_token導出・証明エンジン実行・コミット）
    pub submissions: SubmissionService,
    /// レシート取得
    pub receipts: ReceiptRetrieval,
}

impl GatewayState {
    /// 設定とマッピングストアから共有状態を構築する。
    pub fn new(config: &GatewayConfig, store: Arc<dyn MappingStore>) -> Result<Self, CryptoError> {
        let engine = ProofEngine::new(
            config.engine_path.clone(),
            config.engine_timeout,
            config.engine_max_concurrency,
        );
        let submissions = SubmissionService::new(
            &config.server_secret,
            engine,
            store.clone(),
            config.staging_dir.clone(),
            config.receipt_dir.clone(),
        )?;
        let receipts = ReceiptRetrieval::new(store, config.record_ttl);

        Ok(Self {
            submissions,
            receipts,
        })
    }
}
