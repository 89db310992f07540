//! Type definitions for S3 operations
//!
//! Every option struct carries an optional `bucket`. The service layer uses it
//! to pick a client; the client itself ignores it because it is already bound
//! to one bucket.

use super::error::{S3Error, S3Result};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::AsyncRead;

/// Boxed reader used for streamed uploads
pub type ObjectReader = Box<dyn AsyncRead + Unpin + Send>;

/// Callback invoked after each uploaded part with the completed fraction
pub type ProgressCallback = Arc<dyn Fn(f64, &ResumeState) + Send + Sync>;

/// Default lifetime of a signed URL
pub const DEFAULT_SIGNATURE_EXPIRES: Duration = Duration::from_secs(1800);

/// Maximum keys accepted by a single DeleteObjects request
pub const MAX_DELETE_BATCH: usize = 1000;

/// S3 object listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Object {
    /// Object key (path within bucket)
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: Option<SystemTime>,

    /// ETag (entity tag) - often MD5 hash
    pub etag: Option<String>,

    /// Storage class
    pub storage_class: Option<S3StorageClass>,

    /// Owner ID, when the listing was asked to fetch owners
    pub owner: Option<String>,
}

/// Detailed S3 object metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3ObjectMetadata {
    /// Object key
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: Option<SystemTime>,

    /// ETag
    pub etag: Option<String>,

    /// Storage class
    pub storage_class: Option<S3StorageClass>,

    /// Content type
    pub content_type: Option<String>,

    /// Content encoding
    pub content_encoding: Option<String>,

    /// Cache control
    pub cache_control: Option<String>,

    /// Content disposition
    pub content_disposition: Option<String>,

    /// User-defined metadata
    pub metadata: HashMap<String, String>,

    /// Server-side encryption
    pub server_side_encryption: Option<S3ServerSideEncryption>,

    /// Version ID (if versioning is enabled)
    pub version_id: Option<String>,

    /// Restore status header for archived objects
    pub restore: Option<String>,
}

/// Result of listing objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3ListResult {
    /// List of objects
    pub objects: Vec<S3Object>,

    /// Common prefixes (directories)
    pub common_prefixes: Vec<String>,

    /// Continuation token for the next ListObjectsV2 page
    pub continuation_token: Option<String>,

    /// Marker for the next ListObjects (v1) page
    pub next_marker: Option<String>,

    /// Whether the result is truncated
    pub is_truncated: bool,

    /// Number of keys returned (v2 only)
    pub key_count: Option<i32>,
}

/// S3 storage classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum S3StorageClass {
    /// Standard storage class
    #[default]
    Standard,

    /// Reduced redundancy (deprecated but still available)
    ReducedRedundancy,

    /// Infrequent access
    StandardIa,

    /// One zone infrequent access
    OnezoneIa,

    /// Intelligent tiering
    IntelligentTiering,

    /// Glacier instant retrieval
    #[serde(rename = "GLACIER_IR", alias = "GLACIER_INSTANT_RETRIEVAL")]
    GlacierInstantRetrieval,

    /// Glacier flexible retrieval
    #[serde(rename = "GLACIER", alias = "GLACIER_FLEXIBLE_RETRIEVAL")]
    GlacierFlexibleRetrieval,

    /// Glacier deep archive
    #[serde(rename = "DEEP_ARCHIVE", alias = "GLACIER_DEEP_ARCHIVE")]
    GlacierDeepArchive,
}

impl S3StorageClass {
    /// Convert to AWS SDK storage class
    pub fn to_aws(&self) -> aws_sdk_s3::types::StorageClass {
        use aws_sdk_s3::types::StorageClass;
        match self {
            S3StorageClass::Standard => StorageClass::Standard,
            S3StorageClass::ReducedRedundancy => StorageClass::ReducedRedundancy,
            S3StorageClass::StandardIa => StorageClass::StandardIa,
            S3StorageClass::OnezoneIa => StorageClass::OnezoneIa,
            S3StorageClass::IntelligentTiering => StorageClass::IntelligentTiering,
            S3StorageClass::GlacierInstantRetrieval => StorageClass::GlacierIr,
            S3StorageClass::GlacierFlexibleRetrieval => StorageClass::Glacier,
            S3StorageClass::GlacierDeepArchive => StorageClass::DeepArchive,
        }
    }

    /// Check if this storage class is an archive tier that needs a restore
    pub fn needs_restore(&self) -> bool {
        matches!(
            self,
            S3StorageClass::GlacierFlexibleRetrieval | S3StorageClass::GlacierDeepArchive
        )
    }

    /// Parse the wire name of a storage class, falling back to Standard
    pub fn from_wire(name: &str) -> Self {
        match name {
            "REDUCED_REDUNDANCY" => S3StorageClass::ReducedRedundancy,
            "STANDARD_IA" => S3StorageClass::StandardIa,
            "ONEZONE_IA" => S3StorageClass::OnezoneIa,
            "INTELLIGENT_TIERING" => S3StorageClass::IntelligentTiering,
            "GLACIER_IR" => S3StorageClass::GlacierInstantRetrieval,
            "GLACIER" => S3StorageClass::GlacierFlexibleRetrieval,
            "DEEP_ARCHIVE" => S3StorageClass::GlacierDeepArchive,
            _ => S3StorageClass::Standard,
        }
    }
}

impl fmt::Display for S3StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            S3StorageClass::Standard => "STANDARD",
            S3StorageClass::ReducedRedundancy => "REDUCED_REDUNDANCY",
            S3StorageClass::StandardIa => "STANDARD_IA",
            S3StorageClass::OnezoneIa => "ONEZONE_IA",
            S3StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            S3StorageClass::GlacierInstantRetrieval => "GLACIER_IR",
            S3StorageClass::GlacierFlexibleRetrieval => "GLACIER",
            S3StorageClass::GlacierDeepArchive => "DEEP_ARCHIVE",
        };
        f.write_str(name)
    }
}

/// S3 server-side encryption options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum S3ServerSideEncryption {
    /// AES256 encryption
    Aes256,

    /// AWS KMS encryption
    AwsKms { key_id: Option<String> },

    /// No encryption
    #[default]
    None,
}

impl S3ServerSideEncryption {
    /// Convert to AWS SDK server-side encryption
    pub fn to_aws(&self) -> Option<aws_sdk_s3::types::ServerSideEncryption> {
        match self {
            S3ServerSideEncryption::Aes256 => Some(aws_sdk_s3::types::ServerSideEncryption::Aes256),
            S3ServerSideEncryption::AwsKms { .. } => {
                Some(aws_sdk_s3::types::ServerSideEncryption::AwsKms)
            }
            S3ServerSideEncryption::None => None,
        }
    }

    /// KMS key id, when one is configured
    pub fn kms_key_id(&self) -> Option<&str> {
        match self {
            S3ServerSideEncryption::AwsKms { key_id } => key_id.as_deref(),
            _ => None,
        }
    }
}

/// Options shared by operations that take nothing but the bucket override
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Bucket to route the call to (defaults to the configured bucket)
    pub bucket: Option<String>,
}

impl RequestOptions {
    /// Route the call to the given bucket
    pub fn bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
        }
    }
}

/// Options for `put` and `put_stream`
#[derive(Debug, Clone, Default)]
pub struct PutObjectOptions {
    pub bucket: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    /// User metadata (sent as `x-amz-meta-*`)
    pub meta: HashMap<String, String>,
    /// Overrides the configured storage class
    pub storage_class: Option<S3StorageClass>,
    /// Canned ACL (e.g. "private", "public-read")
    pub acl: Option<String>,
}

/// Result of a put
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutObjectOutput {
    pub name: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Result of a single-object delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteObjectOutput {
    pub name: String,
    pub delete_marker: bool,
    pub version_id: Option<String>,
}

/// Query for ListObjects (v1)
#[derive(Debug, Clone, Default)]
pub struct ListObjectsQuery {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: Option<i32>,
}

/// Query for ListObjectsV2
#[derive(Debug, Clone, Default)]
pub struct ListV2ObjectsQuery {
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: Option<i32>,
    pub fetch_owner: bool,
}

/// Options for `head`
#[derive(Debug, Clone, Default)]
pub struct HeadObjectOptions {
    pub bucket: Option<String>,
    pub version_id: Option<String>,
}

/// Options for `copy`
#[derive(Debug, Clone, Default)]
pub struct CopyObjectOptions {
    pub bucket: Option<String>,
    /// Bucket holding the source object (defaults to the target bucket)
    pub source_bucket: Option<String>,
    pub source_version_id: Option<String>,
    /// Replace metadata instead of copying it from the source
    pub meta: Option<HashMap<String, String>>,
    pub content_type: Option<String>,
    pub storage_class: Option<S3StorageClass>,
}

/// Result of `copy` and `put_meta`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyObjectOutput {
    pub name: String,
    pub etag: Option<String>,
    pub last_modified: Option<SystemTime>,
    pub version_id: Option<String>,
}

/// Options for `get` and `get_stream`
#[derive(Debug, Clone, Default)]
pub struct GetObjectOptions {
    pub bucket: Option<String>,
    pub version_id: Option<String>,
    /// HTTP range, e.g. "bytes=0-99"
    pub range: Option<String>,
}

/// Result of `get`
///
/// `content` is `None` when the body was written to a file.
#[derive(Clone)]
pub struct GetObjectOutput {
    pub name: String,
    pub content: Option<Bytes>,
    pub size: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<SystemTime>,
    pub metadata: HashMap<String, String>,
}

impl fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("name", &self.name)
            .field("content", &self.content.as_ref().map(|c| c.len()))
            .field("size", &self.size)
            .field("etag", &self.etag)
            .field("content_type", &self.content_type)
            .field("last_modified", &self.last_modified)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Result of `get_stream`
pub struct GetStreamOutput {
    pub name: String,
    pub stream: ByteStream,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

impl fmt::Debug for GetStreamOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetStreamOutput")
            .field("name", &self.name)
            .field("content_length", &self.content_length)
            .field("etag", &self.etag)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Options for `delete_multi`
#[derive(Debug, Clone, Default)]
pub struct DeleteMultiOptions {
    pub bucket: Option<String>,
    /// Only report failures
    pub quiet: bool,
}

/// A key that could not be deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMultiFailure {
    pub key: String,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Result of `delete_multi`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteMultiOutput {
    pub deleted: Vec<String>,
    pub errors: Vec<DeleteMultiFailure>,
}

/// HTTP method a signed URL is issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignatureMethod {
    #[default]
    Get,
    Put,
    Head,
    Delete,
}

/// Options for `signature_url`
#[derive(Debug, Clone)]
pub struct SignatureUrlOptions {
    pub bucket: Option<String>,
    pub expires: Duration,
    pub method: SignatureMethod,
    /// Content type the uploader must send (PUT only)
    pub content_type: Option<String>,
    /// Override of the response Content-Disposition (GET only)
    pub response_content_disposition: Option<String>,
    pub version_id: Option<String>,
}

impl Default for SignatureUrlOptions {
    fn default() -> Self {
        Self {
            bucket: None,
            expires: DEFAULT_SIGNATURE_EXPIRES,
            method: SignatureMethod::Get,
            content_type: None,
            response_content_disposition: None,
            version_id: None,
        }
    }
}

/// Options for `init_multipart_upload`
#[derive(Debug, Clone, Default)]
pub struct InitMultipartUploadOptions {
    pub bucket: Option<String>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    pub meta: HashMap<String, String>,
    pub storage_class: Option<S3StorageClass>,
}

/// Result of `init_multipart_upload`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitMultipartUploadOutput {
    pub name: String,
    pub bucket: String,
    pub upload_id: String,
}

/// Body of a single uploaded part
#[derive(Debug, Clone)]
pub enum PartBody {
    /// In-memory bytes
    Bytes(Bytes),
    /// Byte range `[start, end)` of a local file
    File { path: PathBuf, start: u64, end: u64 },
}

impl From<Bytes> for PartBody {
    fn from(data: Bytes) -> Self {
        PartBody::Bytes(data)
    }
}

impl From<Vec<u8>> for PartBody {
    fn from(data: Vec<u8>) -> Self {
        PartBody::Bytes(Bytes::from(data))
    }
}

/// Information about an uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPartInfo {
    /// Part number (1-indexed)
    pub part_number: i32,

    /// ETag of the uploaded part
    pub etag: String,

    /// Size of the part in bytes
    pub size: usize,
}

impl UploadPartInfo {
    /// Create a new upload part info
    pub fn new(part_number: i32, etag: String, size: usize) -> Self {
        Self {
            part_number,
            etag,
            size,
        }
    }
}

/// Part reference passed to `complete_multipart_upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRef {
    pub number: i32,
    pub etag: String,
}

impl From<&UploadPartInfo> for PartRef {
    fn from(info: &UploadPartInfo) -> Self {
        Self {
            number: info.part_number,
            etag: info.etag.clone(),
        }
    }
}

/// Query for `list_parts`
#[derive(Debug, Clone, Default)]
pub struct ListPartsQuery {
    pub max_parts: Option<i32>,
    pub part_number_marker: Option<String>,
}

/// Result of `list_parts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPartsOutput {
    pub parts: Vec<UploadPartInfo>,
    pub next_part_number_marker: Option<String>,
    pub is_truncated: bool,
}

/// Result of completing a multipart upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteMultipartUploadOutput {
    pub name: String,
    pub bucket: String,
    pub etag: Option<String>,
    pub location: Option<String>,
    pub version_id: Option<String>,
}

/// Source of a whole-object multipart upload
#[derive(Debug, Clone)]
pub enum MultipartSource {
    File(PathBuf),
    Buffer(Bytes),
}

/// Options for `multipart_upload` and `multipart_upload_copy`
#[derive(Clone, Default)]
pub struct MultipartUploadOptions {
    pub bucket: Option<String>,
    /// Part size (defaults to the configured chunk size)
    pub part_size: Option<usize>,
    /// Concurrent part transfers (defaults to the configured value)
    pub parallel: Option<usize>,
    /// Checkpoint of an interrupted upload to continue
    pub checkpoint: Option<ResumeState>,
    pub progress: Option<ProgressCallback>,
    pub content_type: Option<String>,
    pub meta: HashMap<String, String>,
    pub storage_class: Option<S3StorageClass>,
}

impl fmt::Debug for MultipartUploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartUploadOptions")
            .field("bucket", &self.bucket)
            .field("part_size", &self.part_size)
            .field("parallel", &self.parallel)
            .field("checkpoint", &self.checkpoint)
            .field("progress", &self.progress.is_some())
            .field("content_type", &self.content_type)
            .field("meta", &self.meta)
            .field("storage_class", &self.storage_class)
            .finish()
    }
}

/// Source of a server-side multipart copy
#[derive(Debug, Clone, Default)]
pub struct MultipartCopySource {
    pub source_key: String,
    /// Defaults to the target bucket
    pub source_bucket: Option<String>,
    /// First byte to copy (inclusive)
    pub start: Option<u64>,
    /// Last byte to copy (inclusive)
    pub end: Option<u64>,
}

/// Query for `list_uploads`
#[derive(Debug, Clone, Default)]
pub struct ListUploadsQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub key_marker: Option<String>,
    pub upload_id_marker: Option<String>,
    pub max_uploads: Option<i32>,
}

/// One in-progress multipart upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartUploadSummary {
    pub name: String,
    pub upload_id: String,
    pub initiated: Option<SystemTime>,
    pub storage_class: Option<S3StorageClass>,
}

/// Result of `list_uploads`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListUploadsOutput {
    pub uploads: Vec<MultipartUploadSummary>,
    pub common_prefixes: Vec<String>,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
    pub is_truncated: bool,
}

/// Parameters of `upload_part_copy`
#[derive(Debug, Clone)]
pub struct UploadPartCopyParams {
    pub name: String,
    pub upload_id: String,
    pub part_no: i32,
    /// Source range, e.g. "bytes=0-5242879"
    pub range: String,
    pub source_key: String,
    /// Defaults to the target bucket
    pub source_bucket: Option<String>,
}

/// Retrieval tier for `restore`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RestoreTier {
    Expedited,
    #[default]
    Standard,
    Bulk,
}

impl RestoreTier {
    pub fn to_aws(&self) -> aws_sdk_s3::types::Tier {
        match self {
            RestoreTier::Expedited => aws_sdk_s3::types::Tier::Expedited,
            RestoreTier::Standard => aws_sdk_s3::types::Tier::Standard,
            RestoreTier::Bulk => aws_sdk_s3::types::Tier::Bulk,
        }
    }
}

/// Options for `restore`
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub bucket: Option<String>,
    /// Days the restored copy stays available
    pub days: i32,
    pub tier: RestoreTier,
    pub version_id: Option<String>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            bucket: None,
            days: 1,
            tier: RestoreTier::Standard,
            version_id: None,
        }
    }
}

/// Result of `restore`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreOutput {
    pub name: String,
    pub restore_output_path: Option<String>,
}

/// Options for `append`
#[derive(Debug, Clone, Default)]
pub struct AppendObjectOptions {
    pub bucket: Option<String>,
    /// Offset the data is written at; must equal the current object size
    pub position: u64,
    pub content_type: Option<String>,
}

/// Result of `append`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendObjectOutput {
    pub name: String,
    pub next_append_position: u64,
    pub etag: Option<String>,
}

/// Resume state for multipart uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    /// Upload ID for multipart upload
    pub upload_id: Option<String>,

    /// Completed parts information
    pub completed_parts: Vec<UploadPartInfo>,

    /// Total size of the object
    pub total_size: u64,

    /// Chunk size used
    pub chunk_size: usize,

    /// ETag of the completed object
    pub etag: Option<String>,
}

impl ResumeState {
    /// Create a new resume state
    pub fn new(upload_id: String, total_size: u64, chunk_size: usize) -> Self {
        Self {
            upload_id: Some(upload_id),
            completed_parts: Vec::new(),
            total_size,
            chunk_size,
            etag: None,
        }
    }

    /// Check if any parts have been uploaded
    pub fn has_progress(&self) -> bool {
        !self.completed_parts.is_empty()
    }

    /// Get the total bytes uploaded
    pub fn bytes_uploaded(&self) -> u64 {
        self.completed_parts.iter().map(|p| p.size as u64).sum()
    }

    /// Fraction of the object uploaded, in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total_size == 0 {
            return 1.0;
        }
        (self.bytes_uploaded() as f64 / self.total_size as f64).min(1.0)
    }
}

/// Parse an HTTP byte range of the form `bytes=start-end` (inclusive bounds)
pub fn parse_byte_range(range: &str) -> S3Result<(u64, u64)> {
    let spec = range
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| S3Error::InvalidRange(format!("missing 'bytes=' prefix: {}", range)))?;

    let (start, end) = spec
        .split_once('-')
        .ok_or_else(|| S3Error::InvalidRange(format!("expected start-end: {}", range)))?;

    let start: u64 = start
        .parse()
        .map_err(|_| S3Error::InvalidRange(format!("bad range start: {}", range)))?;
    let end: u64 = end
        .parse()
        .map_err(|_| S3Error::InvalidRange(format!("bad range end: {}", range)))?;

    if end < start {
        return Err(S3Error::InvalidRange(format!("end before start: {}", range)));
    }

    Ok((start, end))
}

/// Format inclusive bounds as an HTTP byte range
pub fn byte_range(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_display() {
        assert_eq!(S3StorageClass::Standard.to_string(), "STANDARD");
        assert_eq!(S3StorageClass::StandardIa.to_string(), "STANDARD_IA");
        assert_eq!(
            S3StorageClass::GlacierInstantRetrieval.to_string(),
            "GLACIER_IR"
        );
    }

    #[test]
    fn test_storage_class_wire_names() {
        for class in [
            S3StorageClass::Standard,
            S3StorageClass::ReducedRedundancy,
            S3StorageClass::StandardIa,
            S3StorageClass::OnezoneIa,
            S3StorageClass::IntelligentTiering,
            S3StorageClass::GlacierInstantRetrieval,
            S3StorageClass::GlacierFlexibleRetrieval,
            S3StorageClass::GlacierDeepArchive,
        ] {
            assert_eq!(S3StorageClass::from_wire(&class.to_string()), class);
            assert_eq!(class.to_aws().as_str(), class.to_string());
        }
        assert_eq!(
            S3StorageClass::from_wire("SOME_UNKNOWN_CLASS"),
            S3StorageClass::Standard
        );
    }

    #[test]
    fn test_storage_class_serde_uses_wire_names() {
        let json = serde_json::to_string(&S3StorageClass::GlacierDeepArchive).unwrap();
        assert_eq!(json, "\"DEEP_ARCHIVE\"");

        let class: S3StorageClass = serde_json::from_str("\"STANDARD_IA\"").unwrap();
        assert_eq!(class, S3StorageClass::StandardIa);
        let class: S3StorageClass = serde_json::from_str("\"GLACIER_IR\"").unwrap();
        assert_eq!(class, S3StorageClass::GlacierInstantRetrieval);
    }

    #[test]
    fn test_needs_restore() {
        assert!(S3StorageClass::GlacierFlexibleRetrieval.needs_restore());
        assert!(S3StorageClass::GlacierDeepArchive.needs_restore());
        assert!(!S3StorageClass::GlacierInstantRetrieval.needs_restore());
        assert!(!S3StorageClass::Standard.needs_restore());
    }

    #[test]
    fn test_server_side_encryption_to_aws() {
        assert_eq!(
            S3ServerSideEncryption::Aes256.to_aws(),
            Some(aws_sdk_s3::types::ServerSideEncryption::Aes256)
        );
        let kms = S3ServerSideEncryption::AwsKms {
            key_id: Some("my-key".to_string()),
        };
        assert_eq!(
            kms.to_aws(),
            Some(aws_sdk_s3::types::ServerSideEncryption::AwsKms)
        );
        assert_eq!(kms.kms_key_id(), Some("my-key"));
        assert_eq!(S3ServerSideEncryption::None.to_aws(), None);
    }

    #[test]
    fn test_resume_state_progress() {
        let mut state = ResumeState::new("upload123".to_string(), 10, 5);
        assert!(!state.has_progress());
        assert_eq!(state.fraction(), 0.0);

        state
            .completed_parts
            .push(UploadPartInfo::new(1, "etag1".to_string(), 5));
        assert!(state.has_progress());
        assert_eq!(state.bytes_uploaded(), 5);
        assert_eq!(state.fraction(), 0.5);
    }

    #[test]
    fn test_empty_object_is_complete() {
        let state = ResumeState::new("u".to_string(), 0, 5);
        assert_eq!(state.fraction(), 1.0);
    }

    #[test]
    fn test_part_ref_from_info() {
        let info = UploadPartInfo::new(3, "etag-abc".to_string(), 1024);
        let part = PartRef::from(&info);
        assert_eq!(part.number, 3);
        assert_eq!(part.etag, "etag-abc");
    }

    #[test]
    fn test_option_defaults() {
        let sign = SignatureUrlOptions::default();
        assert_eq!(sign.expires, DEFAULT_SIGNATURE_EXPIRES);
        assert_eq!(sign.method, SignatureMethod::Get);

        let restore = RestoreOptions::default();
        assert_eq!(restore.days, 1);
        assert_eq!(restore.tier, RestoreTier::Standard);

        assert_eq!(RequestOptions::bucket("logs").bucket.as_deref(), Some("logs"));
    }

    #[test]
    fn test_get_stream_output_debug_skips_body() {
        let output = GetStreamOutput {
            name: "a.txt".to_string(),
            stream: ByteStream::from_static(b"hello"),
            content_length: Some(5),
            etag: None,
            content_type: None,
        };
        let rendered = format!("{:?}", output);
        assert!(rendered.contains("a.txt"));
        assert!(!rendered.contains("hello"));
    }

    #[test]
    fn test_s3_object_serialization() {
        let obj = S3Object {
            key: "test/file.txt".to_string(),
            size: 12345,
            last_modified: None,
            etag: Some("abc123".to_string()),
            storage_class: Some(S3StorageClass::Standard),
            owner: None,
        };

        let json = serde_json::to_string(&obj).expect("Failed to serialize S3Object");
        let deserialized: S3Object =
            serde_json::from_str(&json).expect("Failed to deserialize S3Object");
        assert_eq!(deserialized, obj);
    }

    #[test]
    fn test_parse_byte_range() {
        assert_eq!(parse_byte_range("bytes=0-99").unwrap(), (0, 99));
        assert_eq!(parse_byte_range(&byte_range(5, 5)).unwrap(), (5, 5));
        assert!(matches!(
            parse_byte_range("0-99"),
            Err(S3Error::InvalidRange(_))
        ));
        assert!(parse_byte_range("bytes=10-2").is_err());
        assert!(parse_byte_range("bytes=a-2").is_err());
        assert!(parse_byte_range("bytes=10-").is_err());
    }
}
