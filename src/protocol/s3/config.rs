//! Configuration types for S3 client

use super::error::{S3Error, S3Result};
use super::types::{S3ServerSideEncryption, S3StorageClass};
use serde::{Deserialize, Serialize};

/// Credentials and client settings for one bucket
///
/// Field aliases accept the `accessKeyId` / `accessKeySecret` spelling used by
/// OSS-style configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,

    /// Region (e.g., "us-east-1", "oss-cn-hangzhou")
    pub region: Option<String>,

    /// Custom endpoint URL (for S3-compatible services like MinIO or OSS)
    pub endpoint: Option<String>,

    /// Access key ID (optional - uses credential chain if not provided)
    #[serde(alias = "access_key_id", alias = "accessKeyId")]
    pub access_key: Option<String>,

    /// Secret access key (optional - uses credential chain if not provided)
    #[serde(alias = "access_key_secret", alias = "accessKeySecret")]
    pub secret_key: Option<String>,

    /// Session token (for temporary credentials)
    #[serde(alias = "stsToken")]
    pub session_token: Option<String>,

    /// Path-style addressing (required for some S3-compatible services)
    pub force_path_style: bool,

    /// Default storage class for uploads
    pub storage_class: S3StorageClass,

    /// Server-side encryption
    pub server_side_encryption: S3ServerSideEncryption,

    /// Part size for multipart uploads (default: 5MB)
    pub chunk_size: usize,

    /// Number of parts transferred concurrently
    pub parallel_operations: usize,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Maximum attempts made by the SDK retry layer
    pub max_retries: u32,

    /// AWS profile name to use for the credential chain
    pub profile: Option<String>,

    /// Use S3 Transfer Acceleration
    pub use_acceleration: bool,
}

impl S3Config {
    /// Create a new S3 config with required parameters
    pub fn new(bucket: String) -> Self {
        Self {
            bucket,
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            session_token: None,
            force_path_style: false,
            storage_class: S3StorageClass::Standard,
            server_side_encryption: S3ServerSideEncryption::None,
            chunk_size: super::DEFAULT_CHUNK_SIZE,
            parallel_operations: super::DEFAULT_PARALLEL_PARTS,
            timeout_seconds: 300, // 5 minutes
            max_retries: 3,
            profile: None,
            use_acceleration: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> S3Result<()> {
        if self.bucket.is_empty() {
            return Err(S3Error::InvalidBucketName(
                "Bucket name cannot be empty".to_string(),
            ));
        }

        if !is_valid_bucket_name(&self.bucket) {
            return Err(S3Error::InvalidBucketName(format!(
                "Invalid bucket name: {}. Bucket names must be 3-63 characters, \
                 lowercase letters, numbers, hyphens, and periods only",
                self.bucket
            )));
        }

        self.validate_settings()
    }

    /// Validate everything except the bucket naming rules
    ///
    /// Routing names in a multi-bucket map are checked with this before any
    /// client exists; naming rules are enforced when the client is built.
    pub fn validate_settings(&self) -> S3Result<()> {
        if self.chunk_size < super::MIN_CHUNK_SIZE {
            return Err(S3Error::InvalidConfig(format!(
                "Chunk size {} is below minimum {}",
                self.chunk_size,
                super::MIN_CHUNK_SIZE
            )));
        }

        if self.chunk_size > super::MAX_CHUNK_SIZE {
            return Err(S3Error::InvalidConfig(format!(
                "Chunk size {} exceeds maximum {}",
                self.chunk_size,
                super::MAX_CHUNK_SIZE
            )));
        }

        if self.parallel_operations == 0 {
            return Err(S3Error::InvalidConfig(
                "Parallel operations must be at least 1".to_string(),
            ));
        }

        if self.parallel_operations > super::MAX_PARALLEL_OPERATIONS {
            return Err(S3Error::InvalidConfig(format!(
                "Parallel operations {} exceeds maximum {}",
                self.parallel_operations,
                super::MAX_PARALLEL_OPERATIONS
            )));
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(S3Error::InvalidConfig(
                "Both access_key and secret_key must be provided together".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if using explicit credentials
    pub fn has_explicit_credentials(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Builder for S3Config
pub struct S3ConfigBuilder {
    config: S3Config,
}

impl S3ConfigBuilder {
    /// Create a new builder with bucket name
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            config: S3Config::new(bucket.into()),
        }
    }

    /// Set the region
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    /// Set custom endpoint (for MinIO, OSS, LocalStack, etc.)
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    /// Set credentials explicitly
    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.config.access_key = Some(access_key.into());
        self.config.secret_key = Some(secret_key.into());
        self
    }

    /// Set session token (for temporary credentials)
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.config.session_token = Some(token.into());
        self
    }

    /// Enable path-style addressing
    pub fn force_path_style(mut self, force: bool) -> Self {
        self.config.force_path_style = force;
        self
    }

    /// Set default storage class
    pub fn storage_class(mut self, storage_class: S3StorageClass) -> Self {
        self.config.storage_class = storage_class;
        self
    }

    /// Set server-side encryption
    pub fn server_side_encryption(mut self, sse: S3ServerSideEncryption) -> Self {
        self.config.server_side_encryption = sse;
        self
    }

    /// Set part size for multipart uploads
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set number of parts transferred concurrently
    pub fn parallel_operations(mut self, count: usize) -> Self {
        self.config.parallel_operations = count;
        self
    }

    /// Set request timeout
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.timeout_seconds = seconds;
        self
    }

    /// Set maximum SDK retry attempts
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set AWS profile name
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config.profile = Some(profile.into());
        self
    }

    /// Enable S3 Transfer Acceleration
    pub fn use_acceleration(mut self, accelerate: bool) -> Self {
        self.config.use_acceleration = accelerate;
        self
    }

    /// Build the configuration
    pub fn build(self) -> S3Result<S3Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Validate S3 bucket name according to AWS rules
fn is_valid_bucket_name(name: &str) -> bool {
    let len = name.len();

    // Length check: 3-63 characters
    if !(3..=63).contains(&len) {
        return false;
    }

    // Must start and end with lowercase letter or number
    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[len - 1]) {
        return false;
    }

    // Only lowercase letters, numbers, hyphens, and periods
    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
            return false;
        }
    }

    if name.contains("..") {
        return false;
    }

    // Cannot be formatted as IP address
    if name.split('.').count() == 4 && name.split('.').all(|s| s.parse::<u8>().is_ok()) {
        return false;
    }

    // Reserved prefix and suffix
    if name.starts_with("xn--") || name.ends_with("-s3alias") {
        return false;
    }

    true
}
