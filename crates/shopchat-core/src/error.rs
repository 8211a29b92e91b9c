//! Backend client error types

use reqwest::StatusCode;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of one exchange with the assistant backend
///
/// The variants carry diagnostics for the log. What the user sees is decided
/// by [`ClientErrorKind`] alone.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend could not be reached, or the connection broke mid-reply
    #[error("could not reach assistant backend at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The backend answered with a non-success status
    #[error("assistant backend returned {status}")]
    Http { status: StatusCode, body: String },

    /// The reply body was not the expected JSON shape
    #[error("could not decode assistant reply: {reason}")]
    Decode { reason: String },
}

impl ClientError {
    pub fn connection(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn http(status: StatusCode, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ClientErrorKind {
        match self {
            Self::Connection { .. } => ClientErrorKind::Connection,
            Self::Http { .. } => ClientErrorKind::Http,
            Self::Decode { .. } => ClientErrorKind::Decode,
        }
    }
}

/// Error classification, used to pick the sentence shown in the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Transport failure: refused, DNS, timeout
    Connection,
    /// Non-2xx status
    Http,
    /// Malformed or incomplete body
    Decode,
}
