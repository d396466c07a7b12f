use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The refresh endpoint rejected the refresh credential or was unreachable.
    RefreshFailed,
    /// An auth-bootstrap endpoint (login, signup, refresh) answered 401.
    AuthRejected { path: String },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshFailed => f.write_str("token refresh failed"),
            Self::AuthRejected { path } => write!(f, "{path} rejected the credentials"),
        }
    }
}

/// Registered by the host application to learn that the session is gone and
/// the user has to sign in again.
pub trait SessionEventHandler: Send + Sync {
    fn on_session_terminated(&self, reason: &TerminationReason);
}

impl<F> SessionEventHandler for F
where
    F: Fn(&TerminationReason) + Send + Sync,
{
    fn on_session_terminated(&self, reason: &TerminationReason) {
        self(reason)
    }
}
