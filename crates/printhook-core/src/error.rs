//! Error types for hook resolution and delivery

use thiserror::Error;

use crate::template::ResolveError;

/// Hook error types
///
/// Every variant is contained at the hook boundary: the pipeline logs it or
/// turns it into a notice, and never lets it reach the event source.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("Invalid hook configuration: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Endpoint responded with status {status}")]
    Status { status: u16 },

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl HookError {
    /// Configuration problems are reported to the user; the rest are only logged.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Resolve(_))
    }
}

/// Result type alias for hook operations
pub type Result<T> = std::result::Result<T, HookError>;
