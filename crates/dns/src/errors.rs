//! Error types for name resolution

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Invalid name {input:?}: {reason}")]
    InvalidInput { input: String, reason: &'static str },

    #[error("Unqualified domain name: {name}")]
    UnqualifiedDomain { name: String },

    #[error("DNS record not found: {name}")]
    NotFound { name: String },

    #[error("DNS record for {name} does not contain a valid key")]
    MalformedRecord { name: String },

    #[error("Resolver settings error: {0}")]
    Settings(String),
}

impl ResolutionError {
    pub(crate) fn invalid(input: &str, reason: &'static str) -> Self {
        Self::InvalidInput {
            input: input.to_string(),
            reason,
        }
    }

    /// True for every failure meaning "no usable key exists for this name".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::MalformedRecord { .. } | Self::UnqualifiedDomain { .. }
        )
    }
}

impl From<config::ConfigError> for ResolutionError {
    fn from(err: config::ConfigError) -> Self {
        Self::Settings(err.to_string())
    }
}

impl From<regex::Error> for ResolutionError {
    fn from(err: regex::Error) -> Self {
        Self::Settings(format!("invalid pattern: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Failure of a single resolution strategy. Never surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("strategy timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no record published")]
    NoRecord,

    #[error("record found but no key matched")]
    Malformed,
}

impl From<TransportError> for StrategyError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NoRecords => StrategyError::NoRecord,
            other => StrategyError::Transport(other.to_string()),
        }
    }
}

/// Errors raised by the DNS and HTTPS collaborators.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no records returned")]
    NoRecords,

    #[error("DNS error: {0}")]
    Dns(#[from] hickory_resolver::ResolveError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Error reported by a persistent cache adapter. Always absorbed by the engine.
#[derive(Error, Debug)]
pub enum PersistentCacheError {
    #[error("no persistent entry for {name}")]
    Miss { name: String },

    #[error("persistent cache backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for PersistentCacheError {
    fn from(value: anyhow::Error) -> Self {
        Self::Backend(value.to_string())
    }
}
