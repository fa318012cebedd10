use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client;

use crate::region::DEFAULT_REGION;
use crate::{ClientFactory, Error, RegionId, Result, StorageBackend};

/// DeleteObjects 1 回あたりの最大キー数
const DELETE_BATCH_SIZE: usize = 1000;

/// aws-sdk-s3 のラッパー
pub struct S3Backend {
    client: Client,
    region: RegionId,
}

/// リージョンに紐づいた S3 クライアントを作成する。
/// 認証情報や接続性はここでは検証されず、最初のリクエストで判明する。
pub async fn create_client(region: Option<RegionId>) -> S3Backend {
    let region = region.unwrap_or(DEFAULT_REGION);
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(region.code))
        .load()
        .await;

    tracing::debug!(region = region.code, "S3 client created");
    S3Backend::new(Client::new(&config), region)
}

impl S3Backend {
    pub fn new(client: Client, region: RegionId) -> Self {
        Self { client, region }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    /// 削除対象のバージョンをすべて列挙して一括削除
    async fn delete_all_versions(&self, bucket: &str) -> Result<()> {
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let page = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(backend_error)?;

            let mut identifiers = Vec::new();
            for version in page.versions() {
                if let Some(key) = version.key() {
                    identifiers.push(object_identifier(key, version.version_id())?);
                }
            }
            for marker in page.delete_markers() {
                if let Some(key) = marker.key() {
                    identifiers.push(object_identifier(key, marker.version_id())?);
                }
            }

            for batch in identifiers.chunks(DELETE_BATCH_SIZE) {
                let delete = Delete::builder()
                    .set_objects(Some(batch.to_vec()))
                    .quiet(true)
                    .build()
                    .map_err(|e| Error::backend(None, e.to_string()))?;

                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(backend_error)?;

                tracing::debug!(bucket, count = batch.len(), "Deleted objects");
            }

            if page.is_truncated() != Some(true) {
                break;
            }
            key_marker = page.next_key_marker().map(str::to_string);
            version_marker = page.next_version_id_marker().map(str::to_string);
        }

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().map(|e| e.is_not_found()) == Some(true) {
                    return Ok(false);
                }
                if let SdkError::ServiceError(ref service) = err {
                    if service.raw().status().as_u16() == 404 {
                        return Ok(false);
                    }
                }
                Err(backend_error(err))
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if let Some(constraint) = location_constraint(self.region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        request.send().await.map_err(backend_error)?;
        Ok(())
    }

    async fn delete_bucket_with_objects(&self, bucket: &str) -> Result<()> {
        self.delete_all_versions(bucket).await?;

        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }
}

/// 実際の S3 に接続するファクトリ
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsClientFactory;

#[async_trait]
impl ClientFactory for AwsClientFactory {
    async fn connect(&self, region: RegionId) -> Arc<dyn StorageBackend> {
        Arc::new(create_client(Some(region)).await)
    }
}

/// us-east-1 以外では LocationConstraint の指定が必要
fn location_constraint(region: RegionId) -> Option<BucketLocationConstraint> {
    if region.code == DEFAULT_REGION.code {
        None
    } else {
        Some(BucketLocationConstraint::from(region.code))
    }
}

fn object_identifier(key: &str, version_id: Option<&str>) -> Result<ObjectIdentifier> {
    ObjectIdentifier::builder()
        .key(key)
        .set_version_id(version_id.map(str::to_string))
        .build()
        .map_err(|e| Error::backend(None, e.to_string()))
}

/// SDK エラーをエラーコード付きの `Error::Backend` に変換
fn backend_error<E, R>(err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let service = err.as_service_error();
    let code = service.and_then(|e| e.code()).map(str::to_string);
    let message = service
        .and_then(|e| e.message())
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    Error::Backend { code, message }
}
