//! Error types for S3 operations

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use std::io;
use thiserror::Error;

/// Result type alias for S3 operations
pub type S3Result<T> = Result<T, S3Error>;

/// Errors that can occur during S3 operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum S3Error {
    /// AWS SDK error that is neither a service nor a transport failure
    #[error("AWS SDK error: {0}")]
    Sdk(String),

    /// S3 service error with the code reported by the service
    #[error("S3 service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Object not found in bucket
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied error
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid bucket name
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// Request could not be built from the given arguments
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Multipart upload error
    #[error("Multipart upload error: {0}")]
    MultipartUpload(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid range request
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

impl S3Error {
    /// Service error code, when the service reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            S3Error::Service { code, .. } => Some(code),
            S3Error::NotFound { .. } => Some("NoSuchKey"),
            S3Error::AccessDenied(_) => Some("AccessDenied"),
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            S3Error::Network(_) => true,
            S3Error::Timeout(_) => true,
            S3Error::Io(_) => true,
            S3Error::Sdk(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("connection reset")
                    || lower.contains("connection timed out")
                    || lower.contains("broken pipe")
                    || lower.contains("connection refused")
                    || lower.contains("temporarily unavailable")
            }
            S3Error::Service { code, .. } => is_retryable_code(code),
            _ => false,
        }
    }

    /// Check if error is transient (safe to retry)
    pub fn is_transient(&self) -> bool {
        matches!(self, S3Error::Network(_) | S3Error::Timeout(_) | S3Error::Io(_))
    }
}

impl From<io::Error> for S3Error {
    fn from(err: io::Error) -> Self {
        S3Error::Io(err.to_string())
    }
}

impl From<aws_sdk_s3::error::BuildError> for S3Error {
    fn from(err: aws_sdk_s3::error::BuildError) -> Self {
        S3Error::InvalidRequest(err.to_string())
    }
}

/// Check if an S3 error code is retryable
pub(crate) fn is_retryable_code(code: &str) -> bool {
    matches!(
        code,
        "RequestTimeout"
            | "ServiceUnavailable"
            | "InternalError"
            | "SlowDown"
            | "RequestTimeTooSkewed"
    )
}

/// Convert AWS SDK errors to S3Error, keeping the service error code
impl<E> From<SdkError<E>> for S3Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(error: SdkError<E>) -> Self {
        match error {
            SdkError::DispatchFailure(e) => {
                S3Error::Network(format!("Network dispatch failure: {:?}", e))
            }
            SdkError::ResponseError(e) => S3Error::Network(format!("Response error: {:?}", e)),
            SdkError::TimeoutError(e) => S3Error::Timeout(format!("{:?}", e)),
            SdkError::ServiceError(context) => {
                let err = context.err();
                let code = err.code().unwrap_or("Unknown").to_string();
                let message = err
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());

                if code == "AccessDenied" {
                    S3Error::AccessDenied(message)
                } else {
                    S3Error::Service { code, message }
                }
            }
            other => S3Error::Sdk(format!("{:?}", other)),
        }
    }
}

/// Map a lookup failure to `NotFound` when the service answered 404
pub(crate) fn not_found_or<E>(error: SdkError<E>, bucket: &str, key: &str) -> S3Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let is_missing = match &error {
        SdkError::ServiceError(context) => {
            context.raw().status().as_u16() == 404
                || matches!(context.err().code(), Some("NoSuchKey" | "NotFound"))
        }
        _ => false,
    };

    if is_missing {
        S3Error::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        S3Error::from(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(S3Error::Network("connection lost".to_string()).is_retryable());
        assert!(S3Error::Timeout("timed out".to_string()).is_retryable());
        assert!(!S3Error::InvalidRequest("bad key".to_string()).is_retryable());
        assert!(!S3Error::AccessDenied("no".to_string()).is_retryable());
    }

    #[test]
    fn test_sdk_network_errors_retryable() {
        assert!(S3Error::Sdk("connection reset by peer".to_string()).is_retryable());
        assert!(S3Error::Sdk("Connection refused".to_string()).is_retryable());
        assert!(!S3Error::Sdk("invalid argument".to_string()).is_retryable());
    }

    #[test]
    fn test_retryable_codes() {
        assert!(is_retryable_code("RequestTimeout"));
        assert!(is_retryable_code("ServiceUnavailable"));
        assert!(is_retryable_code("SlowDown"));
        assert!(!is_retryable_code("NoSuchKey"));
        assert!(!is_retryable_code("AccessDenied"));
    }

    #[test]
    fn test_service_error_retryable() {
        let err = S3Error::Service {
            code: "InternalError".to_string(),
            message: "500".to_string(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_transient());

        let err = S3Error::Service {
            code: "NoSuchBucket".to_string(),
            message: "gone".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_codes() {
        let err = S3Error::NotFound {
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        assert_eq!(err.code(), Some("NoSuchKey"));
        assert_eq!(S3Error::AccessDenied("x".into()).code(), Some("AccessDenied"));
        assert_eq!(S3Error::Io("x".into()).code(), None);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let s3_err: S3Error = io_err.into();
        assert!(matches!(s3_err, S3Error::Io(_)));
    }

    #[test]
    fn test_error_display_formats() {
        let err = S3Error::Service {
            code: "SlowDown".to_string(),
            message: "rate limited".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "S3 service error (SlowDown): rate limited"
        );

        let err = S3Error::NotFound {
            bucket: "my-bucket".to_string(),
            key: "my-key".to_string(),
        };
        assert_eq!(format!("{}", err), "Object not found: my-bucket/my-key");

        let err = S3Error::InvalidBucketName("bad!name".to_string());
        assert_eq!(format!("{}", err), "Invalid bucket name: bad!name");
    }
}
