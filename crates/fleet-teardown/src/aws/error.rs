//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format.

use aws_sdk_iot::error::ProvideErrorMetadata;
use thiserror::Error;

/// Result of one atomic fleet operation
pub type AwsResult<T> = Result<T, AwsError>;

/// AWS error categories for cleanup logic
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AwsError {
    /// Resource was not found (already deleted, counts as success)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Resource still has dependents (e.g. bucket not empty)
    #[error("Resource has dependent objects")]
    DependencyViolation,

    /// Resource is in a state that forbids the call (attached, in use)
    #[error("Resource conflict: {0}")]
    Conflict(String),

    /// Some entries of a batch call were rejected
    #[error("{failed} of {requested} batch entries failed (first error: {first_error})")]
    PartialBatch {
        requested: usize,
        failed: usize,
        first_error: String,
    },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound(_))
    }

    /// Build a generic error from a message, for failures outside the SDK
    pub fn other(message: impl Into<String>) -> Self {
        AwsError::Sdk {
            code: None,
            message: message.into(),
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "NotFoundException",
    "NoSuchEntity",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchTagSet",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

/// Known AWS error codes for dependency violations
const DEPENDENCY_CODES: &[&str] = &["DependencyViolation", "BucketNotEmpty"];

/// Known AWS error codes for state conflicts
const CONFLICT_CODES: &[&str] = &[
    "DeleteConflict",
    "DeleteConflictException",
    "ConflictException",
    "ResourceInUseException",
    "CertificateStateException",
    "InvalidStateTransitionException",
    "VersionConflictException",
];

/// Classify an AWS error using its error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound(message),
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if DEPENDENCY_CODES.contains(&c) => AwsError::DependencyViolation,
        Some(c) if CONFLICT_CODES.contains(&c) => AwsError::Conflict(message),
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK error that exposes error metadata.
///
/// Every service crate re-exports the same `ProvideErrorMetadata` trait, and
/// `SdkError<E, R>` implements it whenever the operation error does.
pub fn classify_sdk_error<E>(error: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    match (error.code(), error.message()) {
        (None, None) => AwsError::other(format!("{error:?}")),
        (code, message) => classify_aws_error(code, message),
    }
}

/// Turn a "not found" result into `Ok(None)`.
///
/// Cleanup steps use this so a resource that is already gone is not
/// reported as a failure.
pub fn ignore_not_found<T>(result: AwsResult<T>) -> AwsResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
