//! バケット操作
//!
//! 各操作の結果は `Outcome` に統一される。作成・存在確認の失敗は
//! `SoftFailure`、削除・アップロードの失敗は `HardFailure` になる。

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::{Error, StorageBackend};

/// バケット操作の結果
#[derive(Debug)]
pub enum Outcome {
    Success,
    /// 呼び出し側で継続可能な失敗 (メッセージ付き)
    SoftFailure(String),
    /// 処理を打ち切るべき失敗
    HardFailure(Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// ユーザー向けの診断メッセージ
    pub fn message(&self) -> Option<String> {
        match self {
            Outcome::Success => None,
            Outcome::SoftFailure(message) => Some(message.clone()),
            Outcome::HardFailure(err) => Some(err.to_string()),
        }
    }
}

/// ensure 操作の結果
#[derive(Debug)]
pub enum EnsureOutcome {
    /// 既に存在していた
    AlreadyExisted,
    /// 新しく作成した
    Created,
    Failed(Outcome),
}

/// バケットが存在するか確認し、`create_if_missing` なら作成する。
///
/// 戻り値は作成前の状態を表す。作成した場合も `false` を返すので、
/// ensure として使う場合は `false` を成功とみなすこと。
/// 作成の成否を知りたい場合は [`ensure_bucket`] を使う。
pub async fn bucket_exists(
    client: &dyn StorageBackend,
    name: &str,
    create_if_missing: bool,
    cancel: &CancellationToken,
) -> bool {
    if name.trim().is_empty() {
        return false;
    }

    match client.bucket_exists(name).await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(bucket = name, error = %e, "Bucket existence check failed");
            return false;
        }
    }

    if create_if_missing {
        if cancel.is_cancelled() {
            tracing::debug!(bucket = name, "Bucket creation cancelled");
            return false;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(bucket = name, "Bucket creation cancelled");
            }
            result = client.create_bucket(name) => match result {
                Ok(()) => tracing::info!(bucket = name, "Bucket created"),
                Err(e) => tracing::warn!(bucket = name, error = %e, "Bucket creation failed"),
            }
        }
    }

    false
}

/// バケットの存在を保証する
pub async fn ensure_bucket(client: &dyn StorageBackend, name: &str) -> EnsureOutcome {
    if name.trim().is_empty() {
        return EnsureOutcome::Failed(Outcome::SoftFailure("Bucket name is required".into()));
    }

    match client.bucket_exists(name).await {
        Ok(true) => EnsureOutcome::AlreadyExisted,
        Ok(false) => match create_bucket(client, name).await {
            Outcome::Success => EnsureOutcome::Created,
            failed => EnsureOutcome::Failed(failed),
        },
        Err(e) => EnsureOutcome::Failed(Outcome::SoftFailure(format!(
            "Error checking bucket: '{}'",
            backend_message(&e)
        ))),
    }
}

/// バケットを作成
pub async fn create_bucket(client: &dyn StorageBackend, name: &str) -> Outcome {
    match client.create_bucket(name).await {
        Ok(()) => {
            tracing::info!(bucket = name, "Bucket created");
            Outcome::Success
        }
        Err(e) => {
            tracing::warn!(bucket = name, error = %e, "Bucket creation failed");
            Outcome::SoftFailure(format!("Error creating bucket: '{}'", backend_message(&e)))
        }
    }
}

/// バケットを中身ごと削除
pub async fn delete_bucket(client: &dyn StorageBackend, name: &str) -> Outcome {
    match client.delete_bucket_with_objects(name).await {
        Ok(()) => {
            tracing::info!(bucket = name, "Bucket deleted");
            Outcome::Success
        }
        Err(e) => Outcome::HardFailure(e.classify()),
    }
}

/// ファイルをアップロード
pub async fn upload_file(
    client: &dyn StorageBackend,
    bucket: &str,
    key: &str,
    local_path: &Path,
    content_type: &str,
) -> Outcome {
    match client
        .put_object(bucket, key, local_path, content_type)
        .await
    {
        Ok(()) => {
            tracing::info!(bucket, key, "Uploaded");
            Outcome::Success
        }
        Err(e) => Outcome::HardFailure(e.classify()),
    }
}

/// バックエンドエラーなら元のメッセージだけを取り出す
fn backend_message(err: &Error) -> String {
    match err {
        Error::Backend { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
