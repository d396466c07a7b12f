use crate::application_impl::*;
use crate::application_port::*;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Tears the local session down: credentials, scheduled refresh, CSRF token.
pub struct SessionTerminator {
    credentials: Arc<CredentialStore>,
    scheduler: Arc<RefreshScheduler>,
    csrf: Arc<CsrfTokenCache>,
    handler: RwLock<Option<Arc<dyn SessionEventHandler>>>,
}

impl SessionTerminator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        scheduler: Arc<RefreshScheduler>,
        csrf: Arc<CsrfTokenCache>,
    ) -> Self {
        Self {
            credentials,
            scheduler,
            csrf,
            handler: RwLock::new(None),
        }
    }

    pub fn set_handler(&self, handler: Arc<dyn SessionEventHandler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// The session ended involuntarily; the host is told to ask for login.
    pub fn terminate(&self, reason: TerminationReason) {
        self.clear_local();
        self.notify(reason);
    }

    /// Like [`terminate`](Self::terminate), but a no-op when the session was
    /// already cleared since `epoch` (logout or an earlier termination).
    pub fn terminate_if_current(&self, epoch: u64, reason: TerminationReason) -> bool {
        if !self.credentials.clear_if_current(epoch) {
            return false;
        }
        self.release();
        self.notify(reason);
        true
    }

    /// Drop local session state without notifying the host (user logout).
    pub fn clear_local(&self) {
        self.credentials.clear();
        self.release();
    }

    // Runs after the credentials are cleared, so a grant racing the clear
    // cannot re-arm a timer that outlives it.
    fn release(&self) {
        self.scheduler.cancel();
        self.csrf.invalidate();
        info!("local session cleared");
    }

    fn notify(&self, reason: TerminationReason) {
        warn!(%reason, "session terminated");
        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler.on_session_terminated(&reason);
        }
    }
}
