//! Error types for update checks and configuration.

use thiserror::Error;

/// Why a single update check produced no answer.
///
/// Every variant aborts the current poll cycle without touching sequencer
/// state; the next timer tick starts over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateCheckError {
    /// The local metadata file is missing, unreadable, or has no usable
    /// `PatchVersion` entry
    #[error("Local version unavailable: {0}")]
    LocalVersionUnavailable(String),

    /// Transport failure or non-success HTTP status
    #[error("Network error: {0}")]
    Network(String),

    /// Body could not be parsed, or the backend answered `success: false`
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Another check is still outstanding
    #[error("An update check is already in flight")]
    AlreadyInFlight,
}

/// Errors raised while loading the plugin configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
