//! # Zvan Gateway 実行ファイル
//!
//! 環境変数から設定を読み込み、マッピングDBを開いてGatewayを起動する。

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use zvan_gateway::config::{GatewayConfig, GatewayState};
use zvan_gateway::endpoints;
use zvan_gateway::storage::{self, MappingStore};

/// 保持期間切れレコードの削除間隔の上限
const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;

    let store = open_store(&config)?;
    let state = Arc::new(GatewayState::new(&config, store)?);

    tracing::info!(
        engine = %config.engine_path.display(),
        timeout_secs = config.engine_timeout.as_secs(),
        max_concurrency = config.engine_max_concurrency,
        "証明エンジン設定"
    );

    if let Some(ttl) = config.record_ttl {
        tracing::info!(ttl_secs = ttl.as_secs(), "レコード保持期間を設定");
        spawn_purge_task(state.clone(), ttl.min(MAX_PURGE_INTERVAL));
    }

    let app = endpoints::router(state, config.max_body_bytes);

    tracing::info!("Gatewayを {} で起動します", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "store-sqlite")]
fn open_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn MappingStore>> {
    let store = storage::SqliteMappingStore::open(&config.db_path)?;
    tracing::info!(path = %config.db_path.display(), "マッピングDBを開きました");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "store-sqlite"))]
fn open_store(_config: &GatewayConfig) -> anyhow::Result<Arc<dyn MappingStore>> {
    tracing::warn!("store-sqlite機能が無効です。メモリ内ストアを使用します（開発環境用）");
    Ok(Arc::new(storage::MemoryMappingStore::new()))
}

/// 保持期間切れのレコードを定期的に削除する。
fn spawn_purge_task(state: Arc<GatewayState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = state.receipts.purge_expired().await {
                tracing::error!(error = %e, "保持期間切れレコードの削除に失敗");
            }
        }
    });
}
