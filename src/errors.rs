/*!
 * Error types for the sitelingo engine.
 *
 * This module contains custom error types for the different parts of the
 * engine, using the thiserror crate for ergonomic error definitions.
 * Per-task errors (`TranslationError`, `IntegrityError`) are recorded and never
 * abort a run; `ConfigError` is fatal and checked before any work starts.
 */

use thiserror::Error;

/// Errors that can occur when talking to a chat-completion provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors that can occur while translating one document blob
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model answered with nothing usable
    #[error("Translation response was empty")]
    EmptyResponse,
}

/// The control sentinel did not survive the translation round-trip
#[derive(Error, Debug)]
#[error("Control sentinel missing or altered in {relative_path} ({language})")]
pub struct IntegrityError {
    /// Document the check failed for
    pub relative_path: String,
    /// Target language of the failed task
    pub language: String,
}

/// Errors raised by cache stores
#[derive(Error, Debug)]
pub enum CacheError {
    /// Local mirror I/O failed
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        /// Path being read or written
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Hosting API returned an unexpected status
    #[error("Hosting API error ({status}) for {endpoint}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Endpoint that failed
        endpoint: String,
        /// Response body or reason
        message: String,
    },

    /// Network failure talking to the hosting API
    #[error("Hosting API request failed: {0}")]
    Network(String),

    /// A git subprocess exited unsuccessfully
    #[error("git {command} failed: {stderr}")]
    Git {
        /// Subcommand that failed
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// Remote rejected a push even after forcing
    #[error("Push to {branch} rejected: {reason}")]
    Rejected {
        /// Target branch
        branch: String,
        /// Reason reported by git
        reason: String,
    },

    /// Snapshot archive could not be read
    #[error("Invalid cache snapshot: {0}")]
    Snapshot(String),

    /// Metadata file could not be parsed or written
    #[error("Invalid cache metadata in {path}: {message}")]
    Metadata {
        /// Metadata file
        path: String,
        /// Parse or serialization message
        message: String,
    },
}

impl CacheError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Fatal configuration problems detected at start-up
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required credential is empty
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// A required external tool is not installed
    #[error("Required tool not available: {0}")]
    MissingTool(String),

    /// A configuration value is invalid
    #[error("Invalid configuration value for {field}: {message}")]
    Invalid {
        /// Offending field
        field: String,
        /// Why it is invalid
        message: String,
    },
}
