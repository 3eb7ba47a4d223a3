//! Error types for wordpress-preflight

use thiserror::Error;
use url::Url;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while gating a scan
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL provided
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// No target URL and no explicit update run requested
    #[error("a target URL is required unless --update is given")]
    MissingUrl,

    /// Unknown server family name
    #[error("unknown server: '{0}' (valid: apache, iis, nginx)")]
    InvalidServer(String),

    /// Invalid output format specified
    #[error("invalid format: '{0}' (valid: cli, json)")]
    InvalidFormat(String),

    /// Required database files are absent and updating was refused
    #[error(
        "required database files are missing and --no-update was given; re-run without --no-update to fetch them"
    )]
    MissingDatabaseFile,

    /// Homepage redirected to an unexpected location
    #[error("the URL supplied redirects to {actual}; re-run against that URL if you trust it")]
    HttpRedirect {
        /// URL the scan was requested against
        expected: Url,
        /// Effective URL after following redirects
        actual: Url,
    },

    /// Target is a wordpress.com hosted blog
    #[error("the target is hosted on wordpress.com and cannot be scanned by this tool")]
    WordPressHosted,

    /// Target failed the WordPress identity check
    #[error(
        "the remote site does not seem to be running WordPress; use --force if you are confident it is"
    )]
    NotWordPress,

    /// Failed to create HTTP client
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    /// HTTP response error status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output operation failed
    #[error("output failed: {0}")]
    OutputFailed(#[source] std::io::Error),

    /// JSON serialization failed
    #[error("JSON serialization failed")]
    SerializationFailed(#[from] serde_json::Error),
}
