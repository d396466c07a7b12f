use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Login, signup, logout and start-up restore on top of the pipeline.
pub struct AuthClient {
    config: Arc<ClientConfig>,
    pipeline: Arc<RequestPipeline>,
    coordinator: Arc<RefreshCoordinator>,
    credentials: Arc<CredentialStore>,
    terminator: Arc<SessionTerminator>,
}

impl AuthClient {
    pub fn new(
        config: Arc<ClientConfig>,
        pipeline: Arc<RequestPipeline>,
        coordinator: Arc<RefreshCoordinator>,
        credentials: Arc<CredentialStore>,
        terminator: Arc<SessionTerminator>,
    ) -> Self {
        Self {
            config,
            pipeline,
            coordinator,
            credentials,
            terminator,
        }
    }

    pub async fn login(&self, input: &LoginInput) -> Result<Session, ApiError> {
        let grant: TokenGrant = self.pipeline.post(&self.config.login_path, input).await?;
        Ok(self.establish(&grant))
    }

    pub async fn signup(&self, input: &SignupInput) -> Result<Session, ApiError> {
        let grant: TokenGrant = self.pipeline.post(&self.config.signup_path, input).await?;
        Ok(self.establish(&grant))
    }

    /// Tell the server, then always drop the local session. An expired token
    /// is not refreshed just to log out.
    pub async fn logout(&self) {
        if self.credentials.access_token().is_some() {
            let request = ApiRequest::new(HttpMethod::Post, self.config.logout_path.clone());
            if let Err(e) = self.pipeline.execute_without_refresh(&request).await {
                warn!("server-side logout failed: {e}");
            }
        }
        self.terminator.clear_local();
        info!("logged out");
    }

    /// Pick up the session a previous run persisted and re-arm its
    /// proactive refresh. An already expired token is refreshed right away.
    pub async fn restore(&self) -> Result<Session, ApiError> {
        let session = self.credentials.session();
        if !session.is_authenticated() {
            return Ok(session);
        }

        match session.remaining_lifetime(Utc::now()) {
            Some(remaining) if remaining.is_zero() => {
                info!("stored token expired, refreshing");
                self.coordinator
                    .ensure_fresh_token()
                    .await
                    .map_err(|_| ApiError::SessionExpired)?;
                Ok(self.credentials.session())
            }
            Some(remaining) => {
                self.coordinator.schedule(remaining);
                Ok(session)
            }
            None => Ok(session),
        }
    }

    fn establish(&self, grant: &TokenGrant) -> Session {
        let session = self.credentials.save_grant(grant);
        self.coordinator.schedule(grant.lifetime());
        info!(
            user = session.user.as_ref().map(|u| u.id.0.as_str()),
            expires_in = grant.expires_in,
            "session established"
        );
        session
    }
}
