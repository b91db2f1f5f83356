//! Error types for the resolution and download pipeline with context and recovery information

use std::path::PathBuf;
use thiserror::Error;

/// Comprehensive error types for resolvers, the dispatcher and the orchestrator
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The URL does not belong to this provider; the dispatcher tries the next one
    #[error("'{url}' is not a {provider} URL")]
    Declined {
        provider: &'static str,
        url: String,
    },

    /// HTTP-related errors with context
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote answered with a status the caller cannot work with
    #[error("Request to '{url}' returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Provider recognised the URL but the response made no sense
    #[error("Could not resolve '{url}': {reason}")]
    Unresolvable {
        url: String,
        reason: String,
    },

    /// JSON payload did not have the expected shape
    #[error("Failed to decode response from '{url}'")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// No registered provider could resolve the URL
    #[error("Invalid URL '{url}'{}", summarize_attempts(.attempts))]
    InvalidUrl {
        url: String,
        attempts: Vec<ProviderAttempt>,
    },

    /// URL parsing errors
    #[error("Malformed URL '{url}'")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Resolved-file record could not be rendered as a sidecar
    #[error("Failed to serialize sidecar '{path}'")]
    Sidecar {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Destination appeared before this writer could claim it
    #[error("'{path}' already exists")]
    AlreadyExists { path: PathBuf },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },

    /// Retry exhaustion with context
    #[error("Maximum retry attempts ({max_retries}) exceeded for '{url}'")]
    MaxRetriesExceeded {
        url: String,
        max_retries: usize,
        #[source]
        last_error: Box<HarvestError>,
    },
}

/// A provider that matched the URL but failed to resolve it
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAttempt {
    pub provider: &'static str,
    pub error: String,
}

fn summarize_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return String::new();
    }
    let details: Vec<String> = attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.provider, attempt.error))
        .collect();
    format!(" ({})", details.join("; "))
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Link,
    Metadata,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Link => write!(f, "linking"),
            FileOperation::Metadata => write!(f, "reading metadata"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    pub fn declined<S: Into<String>>(provider: &'static str, url: S) -> Self {
        HarvestError::Declined {
            provider,
            url: url.into(),
        }
    }

    pub fn file_system<P: Into<PathBuf>>(
        path: P,
        operation: FileOperation,
        source: std::io::Error,
    ) -> Self {
        HarvestError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    /// True when the provider simply does not handle this URL
    pub fn is_decline(&self) -> bool {
        matches!(self, HarvestError::Declined { .. })
    }

    /// Check if error is transient (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        match self {
            HarvestError::HttpRequest { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source
                        .status()
                        .is_some_and(|status| status.is_server_error() || status.as_u16() == 429)
            }
            HarvestError::HttpStatus { status, .. } => {
                status.is_server_error() || status.as_u16() == 429
            }
            HarvestError::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            HarvestError::Declined { .. } => false,
            HarvestError::Unresolvable { .. } => false,
            HarvestError::Decode { .. } => false,
            HarvestError::InvalidUrl { .. } => false,
            HarvestError::MalformedUrl { .. } => false,
            HarvestError::Sidecar { .. } => false,
            HarvestError::AlreadyExists { .. } => false,
            HarvestError::Configuration { .. } => false,
            HarvestError::MaxRetriesExceeded { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            HarvestError::Declined { .. } => "declined",
            HarvestError::HttpRequest { .. } => "http_request",
            HarvestError::HttpStatus { .. } => "http_status",
            HarvestError::Unresolvable { .. } => "unresolvable",
            HarvestError::Decode { .. } => "decode",
            HarvestError::InvalidUrl { .. } => "invalid_url",
            HarvestError::MalformedUrl { .. } => "malformed_url",
            HarvestError::FileSystem { .. } => "file_system",
            HarvestError::Sidecar { .. } => "sidecar",
            HarvestError::AlreadyExists { .. } => "already_exists",
            HarvestError::Configuration { .. } => "configuration",
            HarvestError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decline_is_distinguishable() {
        let declined = HarvestError::declined("Dropbox", "https://example.com");
        assert!(declined.is_decline());
        assert_eq!(declined.to_string(), "'https://example.com' is not a Dropbox URL");

        let failed = HarvestError::HttpStatus {
            url: "https://example.com".to_string(),
            status: reqwest::StatusCode::FORBIDDEN,
        };
        assert!(!failed.is_decline());
    }

    #[test]
    fn test_status_recoverability() {
        let status = |code: u16| HarvestError::HttpStatus {
            url: "u".to_string(),
            status: reqwest::StatusCode::from_u16(code).unwrap(),
        };
        assert!(status(500).is_recoverable());
        assert!(status(503).is_recoverable());
        assert!(status(429).is_recoverable());
        assert!(!status(404).is_recoverable());
        assert!(!status(401).is_recoverable());
    }

    #[test]
    fn test_invalid_url_lists_attempts() {
        let bare = HarvestError::InvalidUrl {
            url: "https://nowhere".to_string(),
            attempts: vec![],
        };
        assert_eq!(bare.to_string(), "Invalid URL 'https://nowhere'");

        let with_attempt = HarvestError::InvalidUrl {
            url: "https://drive.google.com/file/d/abc".to_string(),
            attempts: vec![ProviderAttempt {
                provider: "Google Drive",
                error: "Request to 'x' returned HTTP 403 Forbidden".to_string(),
            }],
        };
        let message = with_attempt.to_string();
        assert!(message.starts_with("Invalid URL 'https://drive.google.com/file/d/abc' (Google Drive: "));
        assert!(message.contains("403"));
        assert_eq!(with_attempt.category(), "invalid_url");
    }

    #[test]
    fn test_sidecar_error_names_sidecar_path() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = HarvestError::Sidecar {
            path: PathBuf::from("out/root/abc.json"),
            source,
        };
        assert_eq!(error.to_string(), "Failed to serialize sidecar 'out/root/abc.json'");
        assert_eq!(error.category(), "sidecar");
        assert!(!error.is_recoverable());
    }
}
