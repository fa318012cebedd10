//! 要求された操作を決まった順番 (ensure → exists → create → bundle → delete)
//! で実行する。どれかが失敗した時点で残りの操作はスキップする。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use s3_helper_core::bucket::{self, EnsureOutcome, Outcome};
use s3_helper_core::bundle::{self, BundleRequest};
use s3_helper_core::{region, ClientFactory, Config, Gated, Sink, StorageBackend};
use tokio_util::sync::CancellationToken;

use crate::cli::{self, Cli};

/// プロセスの終了ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }

    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// 設定ファイル由来の実行時設定
#[derive(Debug, Clone)]
pub struct Settings {
    /// アーカイブを作るディレクトリ
    pub output_dir: PathBuf,
    pub content_type: String,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir(),
            content_type: config.upload.content_type.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// 実行する操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'a> {
    Ensure(&'a str),
    Exists(&'a str),
    Create(&'a str),
    Bundle {
        bucket: &'a str,
        sources: &'a [PathBuf],
    },
    Delete(&'a str),
}

impl Step<'_> {
    fn name(&self) -> &'static str {
        match self {
            Step::Ensure(_) => "ensure",
            Step::Exists(_) => "exists",
            Step::Create(_) => "create",
            Step::Bundle { .. } => "bundle",
            Step::Delete(_) => "delete",
        }
    }
}

/// 要求された操作を実行順に並べる
pub fn plan(cli: &Cli) -> Vec<Step<'_>> {
    let mut steps = Vec::new();

    if let Some(bucket) = cli.ensure() {
        steps.push(Step::Ensure(bucket));
    }
    if let Some(bucket) = cli.exists() {
        steps.push(Step::Exists(bucket));
    }
    if let Some(bucket) = cli.create() {
        steps.push(Step::Create(bucket));
    }
    if let Some(bucket) = cli.bundle() {
        if !cli.bundles.is_empty() {
            steps.push(Step::Bundle {
                bucket,
                sources: &cli.bundles,
            });
        }
    }
    if let Some(bucket) = cli.delete() {
        steps.push(Step::Delete(bucket));
    }

    steps
}

/// 引数を解釈して操作を実行する
pub async fn run<I, T>(
    args: I,
    settings: &Settings,
    factory: &dyn ClientFactory,
    sink: &dyn Sink,
) -> ExitStatus
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let args = cli::normalize_args(args);
    if args.len() <= 1 {
        sink.line(&cli::help_text());
        return ExitStatus::Failure;
    }

    let sink = Gated::new(sink, !cli::silent_requested(&args));

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayVersion => {
            sink.line(e.to_string().trim_end());
            return ExitStatus::Success;
        }
        Err(e) => {
            sink.bad(e.to_string().trim_end());
            return ExitStatus::Failure;
        }
    };

    if cli.help {
        sink.line(&cli::help_text());
        return ExitStatus::Failure;
    }

    if !cli.bundle_combination_is_valid() {
        sink.bad("To bundle, both bundle and bundles must be supplied");
        return ExitStatus::Failure;
    }

    let steps = plan(&cli);
    if steps.is_empty() {
        tracing::debug!("No operation requested");
        return ExitStatus::Success;
    }

    let Some(region_name) = cli.region() else {
        sink.bad("Region is required");
        return ExitStatus::Failure;
    };
    let Some(region) = region::resolve(region_name) else {
        tracing::debug!(region = region_name, "Region lookup failed");
        sink.bad("Unknown Region");
        return ExitStatus::Failure;
    };

    let client = factory.connect(region).await;
    let status = execute(&steps, client.as_ref(), settings, &sink).await;
    drop(client);

    status
}

/// 操作を順に実行し、失敗した時点で打ち切る
pub async fn execute(
    steps: &[Step<'_>],
    client: &dyn StorageBackend,
    settings: &Settings,
    sink: &dyn Sink,
) -> ExitStatus {
    for (i, step) in steps.iter().enumerate() {
        let status = run_step(step, client, settings, sink).await;
        if !status.is_success() {
            let skipped: Vec<&str> = steps[i + 1..].iter().map(Step::name).collect();
            if !skipped.is_empty() {
                tracing::info!(failed = step.name(), ?skipped, "Skipping remaining operations");
            }
            return status;
        }
    }

    ExitStatus::Success
}

async fn run_step(
    step: &Step<'_>,
    client: &dyn StorageBackend,
    settings: &Settings,
    sink: &dyn Sink,
) -> ExitStatus {
    match *step {
        Step::Ensure(bucket) => match bucket::ensure_bucket(client, bucket).await {
            EnsureOutcome::AlreadyExisted => {
                sink.good("Found it");
                ExitStatus::Success
            }
            EnsureOutcome::Created => {
                sink.good("Ensured it");
                ExitStatus::Success
            }
            EnsureOutcome::Failed(outcome) => report_failure(&outcome, sink),
        },
        Step::Exists(bucket) => {
            if exists(client, bucket).await {
                sink.good("Found it");
                ExitStatus::Success
            } else {
                sink.bad("Didn't find it");
                ExitStatus::Failure
            }
        }
        Step::Create(bucket) => report(bucket::create_bucket(client, bucket).await, sink),
        Step::Bundle { bucket, sources } => {
            let request = BundleRequest {
                bucket,
                sources,
                output_dir: settings.output_dir.as_path(),
                content_type: &settings.content_type,
            };
            match bundle::run_bundle(client, request, sink).await {
                Outcome::Success => ExitStatus::Success,
                failed => {
                    if let Some(message) = failed.message() {
                        sink.bad(&message);
                    }
                    ExitStatus::Failure
                }
            }
        }
        Step::Delete(bucket) => {
            if exists(client, bucket).await {
                report(bucket::delete_bucket(client, bucket).await, sink)
            } else {
                sink.bad("Didn't find it");
                ExitStatus::Failure
            }
        }
    }
}

async fn exists(client: &dyn StorageBackend, bucket: &str) -> bool {
    bucket::bucket_exists(client, bucket, false, &CancellationToken::new()).await
}

fn report(outcome: Outcome, sink: &dyn Sink) -> ExitStatus {
    if outcome.is_success() {
        sink.good("Done");
        ExitStatus::Success
    } else {
        report_failure(&outcome, sink)
    }
}

fn report_failure(outcome: &Outcome, sink: &dyn Sink) -> ExitStatus {
    if let Some(message) = outcome.message() {
        sink.bad(&message);
    }
    sink.bad("Failed");
    ExitStatus::Failure
}
