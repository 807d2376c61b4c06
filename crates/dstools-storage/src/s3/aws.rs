//! `aws-sdk-s3` backed client

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::Client;
use dstools_core::{S3AuthStrategy, S3Config, StorageResult};
use std::sync::Arc;

use super::{
    ListObjectsPage, ListObjectsRequest, ObjectStoreClient, ObjectStoreClientError,
    ObjectStoreClientFactory, ObjectSummary,
};

const MAX_ATTEMPTS: u32 = 3;

/// Sort an SDK failure into the categories the analyzer acts on.
fn classify<E>(err: SdkError<E, HttpResponse>) -> ObjectStoreClientError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            ObjectStoreClientError::Connection(message)
        }
        SdkError::ServiceError(service_err) => {
            match (service_err.err().code(), service_err.raw().status().as_u16()) {
                (Some("AccessDenied" | "AllAccessDisabled" | "AccountProblem"), _) => {
                    ObjectStoreClientError::AccessDenied(message)
                }
                (
                    Some(
                        "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
                        | "InvalidToken" | "TokenRefreshRequired",
                    ),
                    _,
                ) => ObjectStoreClientError::Unauthenticated(message),
                (Some("NoSuchBucket" | "NoSuchUpload"), _) => {
                    ObjectStoreClientError::NotFound(message)
                }
                (_, 403) => ObjectStoreClientError::AccessDenied(message),
                (_, 404) => ObjectStoreClientError::NotFound(message),
                _ => ObjectStoreClientError::Service(message),
            }
        }
        // Credential resolution failures surface while the request is being built.
        SdkError::ConstructionFailure(_) => ObjectStoreClientError::Unauthenticated(message),
        _ => ObjectStoreClientError::Service(message),
    }
}

/// S3 client for one configuration
#[derive(Clone)]
pub struct AwsS3Client {
    client: Client,
}

impl AwsS3Client {
    /// Build a client honoring the configuration's auth strategy, region and endpoint.
    ///
    /// Custom endpoints (MinIO, Ceph, DigitalOcean Spaces, ...) use path-style addressing.
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        let strategy = config.auth_strategy()?;

        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(config.region().to_string()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(MAX_ATTEMPTS)
            .with_retry_mode(RetryMode::Standard);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config);

        loader = match &strategy {
            S3AuthStrategy::Explicit {
                access_key_id,
                secret_access_key,
                session_token,
            } => loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                session_token.clone(),
                None,
                "dstools-explicit",
            )),
            S3AuthStrategy::Profile(profile) => loader.profile_name(profile),
            S3AuthStrategy::Ambient => loader,
        };

        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = config
            .endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            region = %config.region(),
            endpoint = ?config.endpoint_url,
            auth_strategy = strategy.name(),
            "Built S3 client"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }
}

#[async_trait]
impl ObjectStoreClient for AwsS3Client {
    async fn list_objects(
        &self,
        request: &ListObjectsRequest,
    ) -> Result<ListObjectsPage, ObjectStoreClientError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token.clone())
            .send()
            .await
            .map_err(classify)?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectSummary {
                    key: object.key()?.to_string(),
                    size: u64::try_from(object.size().unwrap_or(0)).unwrap_or(0),
                })
            })
            .collect();
        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListObjectsPage {
            objects,
            common_prefixes,
            next_continuation_token,
        })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, ObjectStoreClientError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;

        output.upload_id().map(str::to_string).ok_or_else(|| {
            ObjectStoreClientError::Service("CreateMultipartUpload returned no upload id".to_string())
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), ObjectStoreClientError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Production factory: a fresh [`AwsS3Client`] per call.
#[derive(Debug, Clone, Default)]
pub struct AwsClientFactory;

#[async_trait]
impl ObjectStoreClientFactory for AwsClientFactory {
    async fn client_for(&self, config: &S3Config) -> StorageResult<Arc<dyn ObjectStoreClient>> {
        Ok(Arc::new(AwsS3Client::new(config).await?))
    }
}
