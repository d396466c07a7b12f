use crate::domain_port::TransportError;

/// Final, already-classified outcome of a failed pipeline call.
///
/// Intermediate 401 and CSRF 403 responses are absorbed by the pipeline and
/// only show up here once their retry allowance is spent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("network failure: {0}")]
    Network(#[from] TransportError),
    /// Still 401 after a successful refresh.
    #[error("unauthorized")]
    Unauthorized,
    #[error("session expired")]
    SessionExpired,
    #[error("server error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },
    #[error("malformed response: {0}")]
    Client(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Why a token refresh did not produce a new bearer token. Every subscriber
/// of one refresh attempt receives a clone of the same value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh rejected with status {0}")]
    Rejected(u16),
    #[error("refresh transport failure: {0}")]
    Network(#[from] TransportError),
    #[error("malformed refresh response: {0}")]
    Malformed(String),
    #[error("refresh ended without an outcome")]
    Abandoned,
}
