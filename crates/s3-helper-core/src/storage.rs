use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{RegionId, Result};

/// オブジェクトストレージバックエンドの共通インターフェース
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// バケットが存在するか確認
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// クライアントのリージョンにバケットを作成
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// バケットを中身ごと削除
    async fn delete_bucket_with_objects(&self, bucket: &str) -> Result<()>;

    /// ファイルをアップロード
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        content_type: &str,
    ) -> Result<()>;
}

/// リージョンに紐づいたバックエンドを生成する
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, region: RegionId) -> Arc<dyn StorageBackend>;
}
