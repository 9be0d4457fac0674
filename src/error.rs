//! Error types for feed ingestion and flag arbitration.
//!
//! All errors implement the `std::error::Error` trait and carry enough context to
//! decide whether the failing operation is worth retrying.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: connection drops and websocket failures, recovered by reconnecting
//! - **Negotiate Errors**: the HTTP handshake before the websocket upgrade failed
//! - **Parse Errors**: a payload for a known hub/method had an unexpected shape
//! - **Unknown Flag Text**: race-control flag text outside the mapping table
//! - **Configuration Errors**: unknown category or session key at scheduling time
//! - **Config Errors**: the configuration file could not be read or parsed
//! - **File Errors**: a recorded capture could not be read
//!
//! None of these are fatal to the process. Receive loops log them and carry on.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use racecontrol::RaceControlError;
//!
//! let error = RaceControlError::transport("connection reset by peer");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for race control operations.
pub type Result<T, E = RaceControlError> = std::result::Result<T, E>;

/// Main error type for race control operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RaceControlError {
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Negotiation with {endpoint} failed: {reason}")]
    Negotiate { endpoint: String, reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Unknown flag text '{text}'")]
    UnknownFlagText { text: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Failed to load configuration from {path}")]
    Config {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Serialization failed")]
    Serialization(#[from] serde_json::Error),
}

impl RaceControlError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RaceControlError::Transport { .. } => true,
            RaceControlError::Negotiate { .. } => true,
            RaceControlError::Timeout { .. } => true,
            RaceControlError::Parse { .. } => false,
            RaceControlError::UnknownFlagText { .. } => false,
            RaceControlError::Configuration { .. } => false,
            RaceControlError::Config { .. } => false,
            RaceControlError::File { .. } => false,
            RaceControlError::Serialization(_) => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RaceControlError::Transport { .. } => vec![
                "Check network connectivity to the timing provider",
                "Wait for the automatic reconnect",
            ],
            RaceControlError::Negotiate { .. } => vec![
                "Verify the endpoint base URL and path override",
                "Check the negotiated protocol version",
            ],
            RaceControlError::Parse { .. } => vec![
                "Capture the raw frame for inspection",
                "Check whether the provider changed its payload format",
            ],
            RaceControlError::UnknownFlagText { .. } => {
                vec!["Extend the race-control flag text table"]
            }
            RaceControlError::Configuration { .. } => vec![
                "Check the category key of the scheduled session",
                "Check the session key against the chequered threshold table",
            ],
            RaceControlError::Config { .. } => vec![
                "Check the configuration file exists and is readable",
                "Validate the YAML syntax",
            ],
            RaceControlError::File { .. } => vec![
                "Check the capture file exists and is readable",
                "Verify the capture holds one frame per line",
            ],
            RaceControlError::Timeout { .. } => vec![
                "Increase the timeout",
                "Check the provider is reachable",
            ],
            RaceControlError::Serialization(_) => {
                vec!["Check the event payload is representable as JSON"]
            }
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        RaceControlError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RaceControlError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for negotiation errors.
    pub fn negotiate(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        RaceControlError::Negotiate { endpoint: endpoint.into(), reason: reason.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        RaceControlError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for unmapped flag text.
    pub fn unknown_flag_text(text: impl Into<String>) -> Self {
        RaceControlError::UnknownFlagText { text: text.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn configuration(reason: impl Into<String>) -> Self {
        RaceControlError::Configuration { reason: reason.into() }
    }

    /// Helper constructor for capture file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RaceControlError::File { path: path.into(), source }
    }

    /// Helper constructor for configuration file errors.
    pub fn config_file(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RaceControlError::Config { path: path.into(), source: Box::new(source) }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RaceControlError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RaceControlError::transport_with_source("websocket error", Box::new(err))
    }
}

impl From<reqwest::Error> for RaceControlError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".into());
        RaceControlError::negotiate(endpoint, err.to_string())
    }
}

impl From<url::ParseError> for RaceControlError {
    fn from(err: url::ParseError) -> Self {
        RaceControlError::parse("endpoint url", err.to_string())
    }
}
