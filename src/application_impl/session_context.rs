use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

/// One authenticated client session: the single place that owns the bearer
/// token, the CSRF token, the refresh state and the refresh timer.
///
/// Build one per host application and hand out references to
/// [`pipeline`](Self::pipeline) and [`auth`](Self::auth).
pub struct SessionContext {
    config: Arc<ClientConfig>,
    credentials: Arc<CredentialStore>,
    csrf: Arc<CsrfTokenCache>,
    scheduler: Arc<RefreshScheduler>,
    terminator: Arc<SessionTerminator>,
    coordinator: Arc<RefreshCoordinator>,
    pipeline: Arc<RequestPipeline>,
    auth: AuthClient,
}

impl SessionContext {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, StoreError> {
        let config = Arc::new(config);
        let credentials = Arc::new(CredentialStore::load(store)?);
        let csrf = Arc::new(CsrfTokenCache::new(
            transport.clone(),
            config.url(&config.csrf_path),
        ));
        let scheduler = Arc::new(RefreshScheduler::new(config.refresh_ratio));
        let terminator = Arc::new(SessionTerminator::new(
            credentials.clone(),
            scheduler.clone(),
            csrf.clone(),
        ));
        let coordinator = RefreshCoordinator::new(
            transport.clone(),
            config.url(&config.refresh_path),
            credentials.clone(),
            scheduler.clone(),
            terminator.clone(),
        );
        let pipeline = Arc::new(RequestPipeline::new(
            transport,
            config.clone(),
            credentials.clone(),
            csrf.clone(),
            coordinator.clone(),
            terminator.clone(),
        ));
        let auth = AuthClient::new(
            config.clone(),
            pipeline.clone(),
            coordinator.clone(),
            credentials.clone(),
            terminator.clone(),
        );

        Ok(Self {
            config,
            credentials,
            csrf,
            scheduler,
            terminator,
            coordinator,
            pipeline,
            auth,
        })
    }

    /// Register the host's "send the user to login" hook.
    pub fn on_session_terminated<H>(&self, handler: H)
    where
        H: SessionEventHandler + 'static,
    {
        self.terminator.set_handler(Arc::new(handler));
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn csrf(&self) -> &CsrfTokenCache {
        &self.csrf
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.credentials.session()
    }

    pub fn current_user(&self) -> Option<User> {
        self.credentials.user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.access_token().is_some()
    }
}
