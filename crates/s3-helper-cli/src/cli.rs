use std::path::PathBuf;

use clap::{CommandFactory, Parser};

/// `-region` のように 1 つのダッシュでも受け付ける長いオプション
const LEGACY_LONG_OPTIONS: &[&str] = &[
    "region", "exists", "create", "delete", "ensure", "bundle", "bundles",
];

#[derive(Parser, Debug, Default)]
#[command(name = "s3h")]
#[command(
    author,
    version,
    about = "Check, create, delete and ensure S3 buckets, or zip directories into one",
    long_about = None,
    disable_help_flag = true
)]
pub struct Cli {
    /// Region for every operation (us-east-1 or USEast1)
    #[arg(long, value_name = "NAME")]
    pub region: Option<String>,

    /// Report whether the bucket exists
    #[arg(long, value_name = "BUCKET")]
    pub exists: Option<String>,

    /// Create the bucket
    #[arg(long, value_name = "BUCKET")]
    pub create: Option<String>,

    /// Delete the bucket and everything in it, if it exists
    #[arg(long, value_name = "BUCKET")]
    pub delete: Option<String>,

    /// Create the bucket unless it already exists
    #[arg(long, value_name = "BUCKET")]
    pub ensure: Option<String>,

    /// Bucket that receives the bundled archives
    #[arg(long, value_name = "BUCKET")]
    pub bundle: Option<String>,

    /// Directories to zip and upload (requires --bundle)
    #[arg(long, value_name = "PATH", num_args = 1..)]
    pub bundles: Vec<PathBuf>,

    /// Print help and skip all operations
    #[arg(short = '?', long = "help")]
    pub help: bool,

    /// Suppress all console output
    #[arg(short = 's', long = "silent")]
    pub silent: bool,
}

impl Cli {
    pub fn region(&self) -> Option<&str> {
        given(&self.region)
    }

    pub fn exists(&self) -> Option<&str> {
        given(&self.exists)
    }

    pub fn create(&self) -> Option<&str> {
        given(&self.create)
    }

    pub fn delete(&self) -> Option<&str> {
        given(&self.delete)
    }

    pub fn ensure(&self) -> Option<&str> {
        given(&self.ensure)
    }

    pub fn bundle(&self) -> Option<&str> {
        given(&self.bundle)
    }

    /// `--bundle` と `--bundles` は両方指定するか、両方省略する
    pub fn bundle_combination_is_valid(&self) -> bool {
        self.bundle().is_some() == !self.bundles.is_empty()
    }
}

/// 空白だけの値は未指定とみなす
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `-region` 形式の引数を `--region` に書き換える。
/// 先頭 (プログラム名) はそのまま残す。
pub fn normalize_args<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut normalized: Vec<String> = args.next().into_iter().collect();

    for arg in args {
        let legacy = arg
            .strip_prefix('-')
            .filter(|rest| !rest.starts_with('-'))
            .map(str::to_ascii_lowercase)
            .filter(|rest| LEGACY_LONG_OPTIONS.contains(&rest.as_str()));

        match legacy {
            Some(name) => normalized.push(format!("--{}", name)),
            None => normalized.push(arg),
        }
    }

    normalized
}

/// `-s` / `--silent` が指定されているか。
/// パース前に判定するので、パースエラーやログも抑止できる。
pub fn silent_requested<S: AsRef<str>>(args: &[S]) -> bool {
    args.iter()
        .skip(1)
        .any(|arg| matches!(arg.as_ref(), "-s" | "--silent"))
}

/// ヘルプ文字列
pub fn help_text() -> String {
    Cli::command().render_help().to_string()
}
