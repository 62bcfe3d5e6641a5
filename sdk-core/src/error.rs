//! HealthVault error types

use crate::status::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthVaultError {
    /// The platform answered with a non-200 HTTP status.
    #[error("{method}: HTTP {status} {reason}")]
    Http {
        method: String,
        status: u16,
        reason: String,
    },

    #[error("{method}: transport failure: {message}")]
    Transport { method: String, message: String },

    /// A 200 response whose `<status><code>` was non-zero.
    #[error("{method}: platform status {code} ({kind}): {message}")]
    Status {
        method: String,
        kind: ErrorKind,
        code: i32,
        message: String,
    },

    #[error("{method}: protocol error: {reason}")]
    Protocol { method: String, reason: String },

    #[error("parse error at <{element}>: {reason}")]
    Parse { element: String, reason: String },

    /// The caller asked for something the connection cannot do yet.
    #[error("{method}: {reason}")]
    Usage { method: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("Entropy unavailable")]
    EntropyUnavailable,
}

impl HealthVaultError {
    pub(crate) fn parse(element: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(method: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn usage(method: &str, reason: impl Into<String>) -> Self {
        Self::Usage {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Platform status code or HTTP status, when the error carries one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Http { status, .. } => Some(i32::from(*status)),
            _ => None,
        }
    }

    /// Classified kind of a platform status failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Status { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True when the caller should send the user back through authorization.
    pub fn needs_reauthorization(&self) -> bool {
        matches!(
            self.kind(),
            Some(ErrorKind::TokenExpired) | Some(ErrorKind::AccessDenied)
        )
    }
}

pub type Result<T> = std::result::Result<T, HealthVaultError>;
