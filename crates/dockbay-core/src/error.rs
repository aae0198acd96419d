use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a target failure, used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimit,
    Timeout,
    ServerError,
    Generic,
}

impl FailureKind {
    /// Best-effort classification of a free-text failure message.
    pub fn from_message(message: &str) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("429") || m.contains("rate limit") || m.contains("rate-limit") || m.contains("too many requests") {
            return Self::RateLimit;
        }
        if m.contains("timeout") || m.contains("timed out") || m.contains("deadline") {
            return Self::Timeout;
        }
        let server_codes = ["500", "502", "503", "504", "529"];
        if server_codes.iter().any(|c| m.contains(c))
            || m.contains("server error")
            || m.contains("bad gateway")
            || m.contains("overloaded")
            || m.contains("unavailable")
        {
            return Self::ServerError;
        }
        Self::Generic
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed caller input. Never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No collaborator or router target provides the requested capability.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A single chat/embedding target failed; transient from the router's view.
    #[error("Target failure ({kind}): {message}")]
    Target { kind: FailureKind, message: String },

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Vector store protocol error: {0}")]
    StoreProtocol(String),

    /// Every capable target is cooling down.
    #[error("No available targets: {0}")]
    NoAvailableTargets(String),

    #[error("Operation cancelled by caller")]
    Cancelled,

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Target failure classified from its message.
    pub fn target(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Target { kind: FailureKind::from_message(&message), message }
    }

    pub fn target_with_kind(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Target { kind, message: message.into() }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Target { kind, .. } => *kind,
            other => FailureKind::from_message(&other.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Operation(format!("serialization: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
