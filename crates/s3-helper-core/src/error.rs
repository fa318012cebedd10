use std::io;
use thiserror::Error;

/// 認証情報エラーとして扱う S3 エラーコード
const CREDENTIAL_ERROR_CODES: &[&str] = &["InvalidAccessKeyId", "InvalidSecurity"];

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to walk directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Check the provided AWS Credentials.")]
    Credentials,

    #[error("Error occurred: {message}")]
    Backend {
        code: Option<String>,
        message: String,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    /// バックエンドエラーを作成
    pub fn backend(code: Option<&str>, message: impl Into<String>) -> Self {
        Error::Backend {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// 認証情報に起因するバックエンドエラーを `Credentials` に振り分ける
    pub fn classify(self) -> Self {
        match self {
            Error::Backend {
                code: Some(ref code),
                ..
            } if CREDENTIAL_ERROR_CODES.contains(&code.as_str()) => Error::Credentials,
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
