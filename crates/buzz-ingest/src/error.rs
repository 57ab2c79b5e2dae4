//! Error taxonomy for the ingestion engine.
//!
//! Everything below the service layer returns [`FetchError`]. The service
//! converts any of them into a fallback transition, so none of these ever
//! reach a `get_attention_score` caller.

use std::path::PathBuf;

use thiserror::Error;

/// Tag used by the orchestrator to match failure kinds exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Session,
    Throttled,
    MalformedResponse,
    EmptyTimeline,
    Network,
    UpstreamStatus,
}

#[derive(Error, Debug)]
pub enum FetchError {
    /// Cookie bootstrap failed. Non-fatal: requests continue without cookies.
    #[error("session bootstrap failed: {0}")]
    Session(String),

    /// Upstream answered 429.
    #[error("throttled by upstream during {stage}")]
    Throttled { stage: &'static str },

    /// Prefix strip or JSON decode failed, or an expected key is missing.
    #[error("malformed {stage} response: {message}")]
    MalformedResponse { stage: &'static str, message: String },

    /// Well-formed response that carried no usable samples.
    #[error("timeline for '{term}' contained no usable samples")]
    EmptyTimeline { term: String },

    /// Timeout, connection failure, or body read failure.
    #[error("network error during {stage}: {source}")]
    Network {
        stage: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Any other non-success status.
    #[error("upstream returned HTTP {status} during {stage}")]
    UpstreamStatus { stage: &'static str, status: u16 },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Session(_) => FailureKind::Session,
            FetchError::Throttled { .. } => FailureKind::Throttled,
            FetchError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            FetchError::EmptyTimeline { .. } => FailureKind::EmptyTimeline,
            FetchError::Network { .. } => FailureKind::Network,
            FetchError::UpstreamStatus { .. } => FailureKind::UpstreamStatus,
        }
    }

    pub(crate) fn malformed(stage: &'static str, message: impl Into<String>) -> Self {
        FetchError::MalformedResponse {
            stage,
            message: message.into(),
        }
    }

    pub(crate) fn network(stage: &'static str, source: reqwest::Error) -> Self {
        FetchError::Network { stage, source }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration value for '{key}': {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
