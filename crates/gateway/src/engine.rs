//! # 証明エンジンゲートウェイ
//!
//! 外部の証明エンジンをサブプロセスとして起動し、完了を待つ。
//!
//! ## 呼び出し規約（バージョン1）
//! - 位置引数: `<input-path> <host_token> <output-path>`
//! - 同じ値を名前付き環境変数でも渡す:
//!   `ZVAN_ENGINE_CONTRACT`, `ZVAN_INPUT_PATH`, `ZVAN_HOST_TOKEN`, `ZVAN_OUTPUT_PATH`
//! - 終了コード0かつ出力ファイルが存在する場合のみ成功
//!
//! ## 資源制御
//! - セマフォで同時実行プロセス数を制限する（超過分は待機列に並ぶ）
//! - 実行時間の上限を超えた場合はプロセスグループごとkillしてタイムアウトとする

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Semaphore;

/// 呼び出し規約のバージョン
pub const ENGINE_CONTRACT_VERSION: u32 = 1;

/// 証明エンジンの失敗種別。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 非ゼロ終了（シグナル終了の場合はcodeなし）
    #[error("証明エンジンが失敗しました")]
    Exited { code: Option<i32> },
    /// プロセスの起動に失敗
    #[error("証明エンジンの起動に失敗: {0}")]
    Launch(std::io::Error),
    /// 実行時間の上限を超過
    #[error("証明エンジンがタイムアウトしました（{}秒）", .0.as_secs_f64())]
    Timeout(Duration),
    /// 終了コード0だが出力ファイルが存在しない
    #[error("証明エンジンが出力ファイルを生成しませんでした")]
    MissingOutput,
}

/// 証明エンジン1回分の呼び出しパラメータ。
#[derive(Debug, Clone, Copy)]
pub struct EngineInvocation<'a> {
    /// 一時配置した入力ファイル
    pub input_path: &'a Path,
    /// 導出済みhost_token
    pub host_token: &'a str,
    /// 出力ファイル（サーバーが選択）
    pub output_path: &'a Path,
}

/// 証明エンジンのサブプロセスゲートウェイ。
pub struct ProofEngine {
    program: PathBuf,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ProofEngine {
    pub fn new(program: PathBuf, timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            program,
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    /// 実行枠の空き数
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// 証明エンジンを実行し、完了まで待機する。
    pub async fn run(&self, invocation: EngineInvocation<'_>) -> Result<(), EngineError> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            EngineError::Launch(std::io::Error::other(format!("実行枠の取得に失敗: {e}")))
        })?;

        let mut command = Command::new(&self.program);
        command
            .arg(invocation.input_path)
            .arg(invocation.host_token)
            .arg(invocation.output_path)
            .env("ZVAN_ENGINE_CONTRACT", ENGINE_CONTRACT_VERSION.to_string())
            .env("ZVAN_INPUT_PATH", invocation.input_path)
            .env("ZVAN_HOST_TOKEN", invocation.host_token)
            .env("ZVAN_OUTPUT_PATH", invocation.output_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        // 子孫プロセスごと終了できるよう、独立したプロセスグループで起動する
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(EngineError::Launch)?;
        tracing::debug!(
            host_token = %invocation.host_token,
            pid = ?child.id(),
            "証明エンジンを起動"
        );

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "証明エンジンの終了待機に失敗");
                return Err(EngineError::Exited { code: None });
            }
            Err(_) => {
                terminate(&mut child).await;
                return Err(EngineError::Timeout(self.timeout));
            }
        };

        if !status.success() {
            return Err(EngineError::Exited {
                code: status.code(),
            });
        }

        match tokio::fs::try_exists(invocation.output_path).await {
            Ok(true) => Ok(()),
            _ => Err(EngineError::MissingOutput),
        }
    }
}

/// エンジンとその子孫プロセスを終了させる。
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pgid) = child.id() {
        let group = format!("-{pgid}");
        match Command::new("kill")
            .args(["-s", "KILL", "--", group.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!(pgid, code = ?status.code(), "プロセスグループのkillに失敗");
            }
            Err(e) => tracing::warn!(pgid, error = %e, "プロセスグループのkillに失敗"),
        }
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "タイムアウトした証明エンジンのkillに失敗");
    }
}
