/*!
 * bucket-hub - multi-bucket object storage service
 *
 * One service object fronting any number of buckets:
 * - Single-bucket or bucket-map configuration (TOML or JSON)
 * - Lazily built, cached client per bucket
 * - Per-call bucket override with a default bucket fallback
 * - Object, multipart, presign, restore and append operations over the AWS S3 SDK
 * - Storage errors passed through unchanged
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod service;

// Re-export commonly used types
pub use config::{HubConfig, LogConfig, Settings};
pub use error::{HubError, Result};
pub use protocol::ObjectStore;
pub use registry::{ClientFactory, ClientRegistry, S3ClientFactory};
pub use service::OssService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
