use std::process::ExitCode;

use anyhow::{Context, Result};
use s3_helper_core::s3::AwsClientFactory;
use s3_helper_core::{Config, ConsoleSink};
use s3_helper_cli::{cli, run, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().collect();

    // 画面向けの出力は stdout、ログは stderr。-s のときは RUST_LOG が無ければログも出さない
    let default_filter = if cli::silent_requested(&args) { "off" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    let settings = Settings::from(&config);

    let status = run(args, &settings, &AwsClientFactory, &ConsoleSink).await;
    tracing::debug!(?status, "Finished");

    Ok(status.into())
}

/// 設定ファイルを読み込む。HOME が無い環境ではデフォルト設定を使う
fn load_config() -> Result<Config> {
    let path = match Config::config_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "Using default configuration");
            return Ok(Config::default());
        }
    };

    Config::load_from(&path).with_context(|| format!("Failed to load {}", path.display()))
}
