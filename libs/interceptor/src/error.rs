//! Interceptor error types

use codec::ProtocolError;
use thiserror::Error;

/// Errors raised while turning an orchestrator request into a directive
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DirectiveError {
    #[error("Unknown service '{0}': not present in the service directory")]
    UnknownService(String),

    #[error("Invalid parameter for {kind}: {reason}")]
    InvalidParameter { kind: String, reason: String },

    #[error("Unsupported directive kind '{0}'")]
    UnsupportedKind(String),
}

impl DirectiveError {
    pub fn invalid(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level interceptor errors
#[derive(Debug, Error)]
pub enum InterceptorError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Directive error: {0}")]
    Directive(#[from] DirectiveError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline is already running")]
    AlreadyRunning,

    #[error("Pipeline is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InterceptorError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<::config::ConfigError> for InterceptorError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type for interceptor operations
pub type InterceptorResult<T> = std::result::Result<T, InterceptorError>;
