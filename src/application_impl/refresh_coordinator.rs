use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type Subscriber = oneshot::Sender<Result<AccessToken, RefreshError>>;

enum RefreshState {
    Idle,
    Refreshing { subscribers: Vec<Subscriber> },
}

/// Owns the single in-flight token refresh.
///
/// The first demand while idle starts one network refresh in a background
/// task; demands that arrive while it runs queue up behind it. When the
/// refresh settles every queued demand gets the same outcome, in the order
/// it arrived. The task does not depend on any caller staying alive.
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    refresh_url: String,
    credentials: Arc<CredentialStore>,
    scheduler: Arc<RefreshScheduler>,
    terminator: Arc<SessionTerminator>,
    state: Mutex<RefreshState>,
    this: Weak<RefreshCoordinator>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        refresh_url: impl Into<String>,
        credentials: Arc<CredentialStore>,
        scheduler: Arc<RefreshScheduler>,
        terminator: Arc<SessionTerminator>,
    ) -> Arc<Self> {
        let refresh_url = refresh_url.into();
        Arc::new_cyclic(|this| Self {
            transport,
            refresh_url,
            credentials,
            scheduler,
            terminator,
            state: Mutex::new(RefreshState::Idle),
            this: this.clone(),
        })
    }

    /// Arm the proactive refresh for a token living `lifetime`.
    pub fn schedule(&self, lifetime: Duration) {
        let this: Weak<dyn TokenRefresher> = self.this.clone();
        self.scheduler.arm(lifetime, this);
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            RefreshState::Refreshing { .. }
        )
    }

    /// Arm for a grant installed under `epoch`, unless the session was
    /// cleared while arming.
    fn schedule_for(&self, epoch: u64, lifetime: Duration) {
        let this: Weak<dyn TokenRefresher> = self.this.clone();
        let generation = self.scheduler.arm(lifetime, this);
        if self.credentials.epoch() != epoch {
            self.scheduler.cancel_generation(generation);
        }
    }

    async fn run_refresh(self: Arc<Self>, epoch: u64) {
        info!("refreshing access token");
        let outcome = match self.request_refresh().await {
            Ok(grant) => match self.credentials.save_grant_if_current(epoch, &grant) {
                Some(_) => {
                    self.schedule_for(epoch, grant.lifetime());
                    info!(expires_in = grant.expires_in, "access token refreshed");
                    Ok(grant.access_token)
                }
                None => {
                    info!("session ended during refresh, discarding new token");
                    Err(RefreshError::Abandoned)
                }
            },
            Err(e) => {
                warn!("access token refresh failed: {e}");
                // tear down before resolving, so waiters see a cleared session
                if !self
                    .terminator
                    .terminate_if_current(epoch, TerminationReason::RefreshFailed)
                {
                    debug!("session already ended, not terminating again");
                }
                Err(e)
            }
        };

        let subscribers = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { subscribers } => subscribers,
                RefreshState::Idle => Vec::new(),
            }
        };
        debug!(waiters = subscribers.len(), "resolving refresh subscribers");
        for subscriber in subscribers {
            // a dropped receiver just means its caller went away
            let _ = subscriber.send(outcome.clone());
        }
    }

    /// `POST` the refresh endpoint. The refresh credential rides in a cookie;
    /// the request never carries the bearer token.
    async fn request_refresh(&self) -> Result<TokenGrant, RefreshError> {
        let response = self
            .transport
            .send(TransportRequest::new(HttpMethod::Post, &self.refresh_url))
            .await?;
        if !response.is_success() {
            return Err(RefreshError::Rejected(response.status));
        }
        serde_json::from_slice(&response.body).map_err(|e| RefreshError::Malformed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl TokenRefresher for RefreshCoordinator {
    async fn ensure_fresh_token(&self) -> Result<AccessToken, RefreshError> {
        let (tx, rx) = oneshot::channel();
        let epoch = self.credentials.epoch();
        let start = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match &mut *state {
                RefreshState::Refreshing { subscribers } => {
                    subscribers.push(tx);
                    false
                }
                idle @ RefreshState::Idle => {
                    *idle = RefreshState::Refreshing {
                        subscribers: vec![tx],
                    };
                    true
                }
            }
        };

        if start {
            match self.this.upgrade() {
                Some(this) => {
                    tokio::spawn(this.run_refresh(epoch));
                }
                None => {
                    *self.state.lock().unwrap_or_else(PoisonError::into_inner) =
                        RefreshState::Idle;
                    return Err(RefreshError::Abandoned);
                }
            }
        } else {
            debug!("joining in-flight token refresh");
        }

        rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }
}
