use crate::application_impl::response::{server_error, success_payload};
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

enum Outcome {
    Success,
    Unauthorized,
    CsrfRejected(ApiError),
    Failed(ApiError),
}

/// Sends every API call with the right credentials and transparently
/// recovers from an expired bearer token (one refresh) and a rejected CSRF
/// token (as many refetches as the call's [`RetryBudget`] allows).
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
    credentials: Arc<CredentialStore>,
    csrf: Arc<CsrfTokenCache>,
    refresher: Arc<dyn TokenRefresher>,
    terminator: Arc<SessionTerminator>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: Arc<ClientConfig>,
        credentials: Arc<CredentialStore>,
        csrf: Arc<CsrfTokenCache>,
        refresher: Arc<dyn TokenRefresher>,
        terminator: Arc<SessionTerminator>,
    ) -> Self {
        Self {
            transport,
            config,
            credentials,
            csrf,
            refresher,
            terminator,
        }
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<Option<serde_json::Value>, ApiError> {
        self.execute_with_budget(request, RetryBudget::default())
            .await
    }

    /// Run one logical call.
    ///
    /// A 401 triggers at most one refresh per call, after which the call is
    /// re-sent once with the renewed token. Retries share `budget`, so the
    /// re-sent call only gets whatever CSRF retries are left.
    pub async fn execute_with_budget(
        &self,
        request: &ApiRequest,
        budget: RetryBudget,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        self.run(request, budget, true).await
    }

    /// Run a call that must not start a refresh: a 401 is returned as
    /// [`ApiError::Unauthorized`] and the session is left alone.
    pub async fn execute_without_refresh(
        &self,
        request: &ApiRequest,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        self.run(request, RetryBudget::default(), false).await
    }

    async fn run(
        &self,
        request: &ApiRequest,
        mut budget: RetryBudget,
        allow_refresh: bool,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        let route = request.route();
        let mut renewed: Option<AccessToken> = None;

        loop {
            let response = self.dispatch(request, renewed.as_ref()).await?;
            match self.classify(&response) {
                Outcome::Success => return success_payload(&response),
                Outcome::Unauthorized if self.config.is_auth_bootstrap(route) => {
                    self.terminator.terminate(TerminationReason::AuthRejected {
                        path: route.to_owned(),
                    });
                    return Err(ApiError::SessionExpired);
                }
                Outcome::Unauthorized if renewed.is_some() || !allow_refresh => {
                    return Err(ApiError::Unauthorized);
                }
                Outcome::Unauthorized => match self.refresher.ensure_fresh_token().await {
                    Ok(token) => {
                        debug!(method = %request.method, route, "retrying with renewed token");
                        renewed = Some(token);
                    }
                    // the coordinator has already torn the session down
                    Err(e) => {
                        info!(route, "giving up after failed refresh: {e}");
                        return Err(ApiError::SessionExpired);
                    }
                },
                Outcome::CsrfRejected(error) => match budget.spend() {
                    Some(rest) => {
                        debug!(method = %request.method, route, "csrf token rejected, refetching");
                        self.csrf.invalidate();
                        budget = rest;
                    }
                    None => return Err(error),
                },
                Outcome::Failed(error) => return Err(error),
            }
        }
    }

    /// Deserialize the success payload into `T`. No-content responses
    /// deserialize from `null`, so `()` and `Option<_>` work for them.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let payload = self
            .execute(request)
            .await?
            .unwrap_or(serde_json::Value::Null);
        serde_json::from_value(payload).map_err(|e| ApiError::Client(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_json(&ApiRequest::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute_json(&ApiRequest::post(path, to_body(body)?))
            .await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute_json(&ApiRequest::put(path, to_body(body)?))
            .await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute_json(&ApiRequest::patch(path, to_body(body)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_json(&ApiRequest::delete(path)).await
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        renewed: Option<&AccessToken>,
    ) -> Result<TransportResponse, ApiError> {
        let mut outbound = TransportRequest::new(request.method, self.config.url(&request.path))
            .with_body(request.body.clone());

        if request.method.is_state_changing() {
            let csrf = self.csrf.obtain().await?;
            outbound = outbound.with_header(CSRF_HEADER, csrf.as_str());
        }
        let token = renewed.cloned().or_else(|| self.credentials.access_token());
        if let Some(token) = token {
            outbound = outbound.with_header(AUTHORIZATION_HEADER, token.bearer());
        }

        let response = self.transport.send(outbound).await?;
        debug!(
            method = %request.method,
            route = request.route(),
            status = response.status,
            "api call finished"
        );
        Ok(response)
    }

    fn classify(&self, response: &TransportResponse) -> Outcome {
        if response.is_success() {
            return Outcome::Success;
        }
        if response.status == 401 {
            return Outcome::Unauthorized;
        }
        let error = server_error(response);
        let csrf = response.status == 403
            && error.code().is_some_and(|code| self.config.is_csrf_code(code));
        if csrf {
            Outcome::CsrfRejected(error)
        } else {
            Outcome::Failed(error)
        }
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Client(e.to_string()))
}
