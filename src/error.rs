/*!
 * Error types for bucket-hub
 */

use crate::protocol::s3::S3Error;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_STORAGE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

#[derive(Debug, Error)]
pub enum HubError {
    /// No bucket was named and the configuration has no default
    #[error("no bucket given and no default bucket is configured")]
    NoDefaultBucket,

    /// The named bucket has no credentials in the configuration
    #[error("unknown bucket '{0}': no credentials configured for it")]
    UnknownBucket(String),

    /// The configuration itself is malformed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The client for a configured bucket could not be built
    #[error("failed to create client for bucket '{bucket}': {source}")]
    ClientInit {
        bucket: String,
        #[source]
        source: S3Error,
    },

    /// Failure reported by the storage client, carried unchanged
    #[error(transparent)]
    Storage(#[from] S3Error),
}

impl HubError {
    /// Whether the error comes from configuration rather than from storage
    ///
    /// Configuration errors are raised before any request is sent.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, HubError::Storage(_))
    }

    /// The storage error, when this is one
    pub fn storage(&self) -> Option<&S3Error> {
        match self {
            HubError::Storage(e) => Some(e),
            _ => None,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() {
            EXIT_CONFIG
        } else {
            EXIT_STORAGE
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            HubError::NoDefaultBucket | HubError::UnknownBucket(_) => ErrorCategory::Routing,
            HubError::InvalidConfig(_) => ErrorCategory::Configuration,
            HubError::ClientInit { .. } => ErrorCategory::Client,
            HubError::Storage(_) => ErrorCategory::Storage,
        }
    }
}

impl From<toml::de::Error> for HubError {
    fn from(err: toml::de::Error) -> Self {
        HubError::InvalidConfig(err.to_string())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::InvalidConfig(err.to_string())
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bucket name could not be resolved
    Routing,
    /// Malformed configuration
    Configuration,
    /// Client construction failed
    Client,
    /// Failure reported by the storage service
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Routing => write!(f, "routing"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Client => write!(f, "client"),
            ErrorCategory::Storage => write!(f, "storage"),
        }
    }
}
