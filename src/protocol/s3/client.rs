//! S3 client implementation

use super::config::S3Config;
use super::error::{not_found_or, S3Error, S3Result};
use super::types::{S3ObjectMetadata, S3ServerSideEncryption, S3StorageClass};
use super::ObjectStore;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::primitives::DateTime;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as AwsS3Client;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// S3 client bound to one bucket
#[derive(Clone)]
pub struct S3Client {
    /// AWS S3 client
    client: AwsS3Client,

    /// Client configuration
    config: S3Config,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("bucket", &self.config.bucket)
            .field("region", &self.config.region)
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    /// Create a new S3 client with the given configuration
    ///
    /// No request is sent; credentials and region are resolved lazily by the
    /// SDK when they come from the default provider chain.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bucket_hub::protocol::s3::{S3Client, S3Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = S3Config::new("my-bucket".to_string());
    ///     let client = S3Client::new(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: S3Config) -> S3Result<Self> {
        config.validate()?;

        let client = Self::build_aws_client(&config).await?;
        debug!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint,
            explicit_credentials = config.has_explicit_credentials(),
            "built S3 client"
        );

        Ok(Self { client, config })
    }

    /// Build the AWS SDK S3 client from configuration
    async fn build_aws_client(config: &S3Config) -> S3Result<AwsS3Client> {
        let mut aws_config_loader = aws_config::defaults(BehaviorVersion::latest());

        let region_provider = if let Some(region_str) = &config.region {
            RegionProviderChain::first_try(Region::new(region_str.clone()))
        } else {
            RegionProviderChain::default_provider()
        };
        aws_config_loader = aws_config_loader.region(region_provider);

        if let Some(profile) = &config.profile {
            aws_config_loader = aws_config_loader.profile_name(profile);
        }

        // Explicit credentials take precedence over the provider chain
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "bucket-hub-explicit",
            );
            aws_config_loader = aws_config_loader.credentials_provider(credentials);
        }

        let aws_config = aws_config_loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        // Required for MinIO and LocalStack
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        if config.use_acceleration {
            s3_config_builder = s3_config_builder.accelerate(true);
        }

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_seconds))
            .build();
        s3_config_builder = s3_config_builder.timeout_config(timeout_config);

        let retry_config = RetryConfig::standard().with_max_attempts(config.max_retries.max(1));
        s3_config_builder = s3_config_builder.retry_config(retry_config);

        Ok(AwsS3Client::from_conf(s3_config_builder.build()))
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Get a reference to the underlying AWS S3 client
    pub fn aws_client(&self) -> &AwsS3Client {
        &self.client
    }

    /// Test the connection by heading the bucket
    pub async fn test_connection(&self) -> S3Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(S3Error::from)?;
        Ok(())
    }

    /// Check if an object exists in the bucket
    pub async fn exists(&self, key: &str) -> S3Result<bool> {
        match self.head_in(self.bucket(), key, None).await {
            Ok(_) => Ok(true),
            Err(S3Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Head an object in any bucket these credentials can reach
    pub(super) async fn head_in(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> S3Result<S3ObjectMetadata> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| not_found_or(e, bucket, key))?;

        Ok(metadata_from_head(key, &response))
    }

    /// `x-amz-copy-source` value for an object
    pub(super) fn copy_source(&self, bucket: Option<&str>, key: &str) -> String {
        copy_source(bucket.unwrap_or(self.bucket()), key)
    }

    /// Server-side encryption settings applied to every write
    pub(super) fn sse(&self) -> (Option<ServerSideEncryption>, Option<String>) {
        let sse = &self.config.server_side_encryption;
        (sse.to_aws(), sse.kms_key_id().map(str::to_string))
    }

    /// Storage class for a write, falling back to the configured default
    pub(super) fn storage_class_for(&self, requested: Option<S3StorageClass>) -> S3StorageClass {
        requested.unwrap_or(self.config.storage_class)
    }
}

impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

/// Build a copy source, percent-encoding the key but keeping path separators
pub(super) fn copy_source(bucket: &str, key: &str) -> String {
    format!(
        "{}/{}",
        bucket,
        urlencoding::encode(key).replace("%2F", "/")
    )
}

pub(super) fn to_system_time(dt: Option<&DateTime>) -> Option<SystemTime> {
    dt.and_then(|dt| SystemTime::try_from(*dt).ok())
}

pub(super) fn user_metadata(meta: &HashMap<String, String>) -> Option<HashMap<String, String>> {
    if meta.is_empty() {
        None
    } else {
        Some(meta.clone())
    }
}

fn metadata_from_head(key: &str, response: &HeadObjectOutput) -> S3ObjectMetadata {
    let server_side_encryption = response.server_side_encryption().map(|sse| match sse {
        ServerSideEncryption::Aes256 => S3ServerSideEncryption::Aes256,
        ServerSideEncryption::AwsKms => S3ServerSideEncryption::AwsKms {
            key_id: response.ssekms_key_id().map(|s| s.to_string()),
        },
        _ => S3ServerSideEncryption::None,
    });

    S3ObjectMetadata {
        key: key.to_string(),
        size: response.content_length().unwrap_or(0).max(0) as u64,
        last_modified: to_system_time(response.last_modified()),
        etag: response.e_tag().map(|s| s.to_string()),
        storage_class: response
            .storage_class()
            .map(|sc| S3StorageClass::from_wire(sc.as_str())),
        content_type: response.content_type().map(|s| s.to_string()),
        content_encoding: response.content_encoding().map(|s| s.to_string()),
        cache_control: response.cache_control().map(|s| s.to_string()),
        content_disposition: response.content_disposition().map(|s| s.to_string()),
        metadata: response.metadata().cloned().unwrap_or_default(),
        server_side_encryption,
        version_id: response.version_id().map(|s| s.to_string()),
        restore: response.restore().map(|s| s.to_string()),
    }
}
