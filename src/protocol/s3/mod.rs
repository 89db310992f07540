//! S3 protocol adapter
//!
//! Wraps the official AWS SDK for Rust behind two traits, [`S3Operations`]
//! and [`MultipartOperations`]. Together they form [`ObjectStore`], the unit
//! the client registry hands out per bucket. Works with AWS S3 and
//! S3-compatible services (Aliyun OSS, MinIO, LocalStack) via a custom
//! endpoint.
//!
//! # Features
//!
//! - Single-request object operations (put, get, head, copy, list, delete)
//! - Streamed uploads that switch to multipart once a stream exceeds one part
//! - Multipart uploads with bounded parallelism and checkpoint resume
//! - Server-side multipart copy
//! - Presigned URLs, archive restore and append writes
//!
//! # Example
//!
//! ```ignore
//! use bucket_hub::protocol::s3::{PutObjectOptions, S3Client, S3Config, S3Operations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = S3Config {
//!         bucket: "my-bucket".to_string(),
//!         endpoint: Some("http://localhost:9000".to_string()),
//!         region: Some("us-east-1".to_string()),
//!         access_key: Some("minioadmin".to_string()),
//!         secret_key: Some("minioadmin".to_string()),
//!         force_path_style: true,
//!         ..Default::default()
//!     };
//!
//!     let client = S3Client::new(config).await?;
//!     client
//!         .put("hello.txt", "hello".into(), &PutObjectOptions::default())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod multipart;
mod operations;
mod types;


pub use client::S3Client;
pub use config::{S3Config, S3ConfigBuilder};
pub use error::{S3Error, S3Result};
pub use multipart::{plan_parts, start_checkpoint, MultipartOperations, PartSpan};
pub use operations::S3Operations;
pub use types::*;

/// Everything one bucket's client can do
///
/// Implemented by [`S3Client`] and by the in-memory test store.
pub trait ObjectStore: S3Operations + MultipartOperations + Send + Sync + 'static {
    /// Bucket this client is bound to
    fn bucket(&self) -> &str;
}

/// Default multipart chunk size (5 MB - minimum for S3)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Maximum multipart chunk size (5 GB)
pub const MAX_CHUNK_SIZE: usize = 5 * 1024 * 1024 * 1024;

/// Minimum multipart chunk size required by S3
pub const MIN_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Default number of parallel upload parts
pub const DEFAULT_PARALLEL_PARTS: usize = 4;

/// Maximum number of parallel operations
pub const MAX_PARALLEL_OPERATIONS: usize = 16;

/// Maximum number of parts in one multipart upload
pub const MAX_PARTS: u64 = 10_000;
