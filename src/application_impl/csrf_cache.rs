use crate::application_impl::response::server_error;
use crate::application_port::ApiError;
use crate::domain_model::*;
use crate::domain_port::*;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

type CsrfFetch = Shared<BoxFuture<'static, Result<CsrfToken, ApiError>>>;

#[derive(Default)]
struct CsrfState {
    value: Option<CsrfToken>,
    inflight: Option<CsrfFetch>,
}

/// Holds the current anti-CSRF token. Concurrent [`obtain`](Self::obtain)
/// calls share one fetch of the issuance endpoint.
pub struct CsrfTokenCache {
    transport: Arc<dyn Transport>,
    url: String,
    state: Arc<Mutex<CsrfState>>,
}

impl CsrfTokenCache {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            state: Arc::new(Mutex::new(CsrfState::default())),
        }
    }

    /// Cached token, or the result of the one outstanding fetch.
    pub async fn obtain(&self) -> Result<CsrfToken, ApiError> {
        let fetch = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = &state.value {
                return Ok(token.clone());
            }
            match state.inflight.clone() {
                Some(fetch) => fetch,
                None => {
                    let fetch = self.start_fetch();
                    state.inflight = Some(fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Forget the cached value. A fetch already in flight is left alone.
    pub fn invalidate(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value = None;
    }

    pub fn cached(&self) -> Option<CsrfToken> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    fn start_fetch(&self) -> CsrfFetch {
        let transport = Arc::clone(&self.transport);
        let url = self.url.clone();
        let state = Arc::clone(&self.state);

        async move {
            debug!("fetching csrf token");
            let result = fetch_csrf_token(transport.as_ref(), url).await;

            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.inflight = None;
            match &result {
                Ok(token) => state.value = Some(token.clone()),
                Err(e) => warn!("csrf token fetch failed: {e}"),
            }
            result
        }
        .boxed()
        .shared()
    }
}

async fn fetch_csrf_token(transport: &dyn Transport, url: String) -> Result<CsrfToken, ApiError> {
    let response = transport
        .send(TransportRequest::new(HttpMethod::Get, url))
        .await?;
    if !response.is_success() {
        return Err(server_error(&response));
    }
    let body: CsrfTokenResponse =
        serde_json::from_slice(&response.body).map_err(|e| ApiError::Client(e.to_string()))?;
    Ok(body.csrf_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::FakeTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const BASE: &str = "http://api.test";

    fn cache_with(transport: &Arc<FakeTransport>) -> CsrfTokenCache {
        CsrfTokenCache::new(transport.clone(), format!("{BASE}/csrf-token"))
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_obtain_shares_one_fetch() {
        let transport = Arc::new(FakeTransport::new(BASE));
        transport.respond(HttpMethod::Get, "/csrf-token", 200, json!({ "csrfToken": "c1" }));
        transport.set_latency(HttpMethod::Get, "/csrf-token", Duration::from_millis(50));
        let cache = cache_with(&transport);

        let (a, b, c) = tokio::join!(cache.obtain(), cache.obtain(), cache.obtain());
        for token in [a, b, c] {
            assert_eq!(token.unwrap().as_str(), "c1");
        }
        assert_eq!(transport.count(HttpMethod::Get, "/csrf-token"), 1);

        // served from cache afterwards
        cache.obtain().await.unwrap();
        assert_eq!(transport.count(HttpMethod::Get, "/csrf-token"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reaches_every_waiter_and_allows_retry() {
        let transport = Arc::new(FakeTransport::new(BASE));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        transport.route(HttpMethod::Get, "/csrf-token", move |_, n| {
            counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(TransportError::Connect("refused".into()))
            } else {
                Ok(TransportResponse::json(200, &json!({ "csrfToken": "c2" })))
            }
        });
        transport.set_latency(HttpMethod::Get, "/csrf-token", Duration::from_millis(50));
        let cache = cache_with(&transport);

        let (a, b) = tokio::join!(cache.obtain(), cache.obtain());
        assert!(matches!(a, Err(ApiError::Network(_))));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.obtain().await.unwrap().as_str(), "c2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_new_fetch() {
        let transport = Arc::new(FakeTransport::new(BASE));
        transport.route(HttpMethod::Get, "/csrf-token", |_, n| {
            Ok(TransportResponse::json(200, &json!({ "csrfToken": format!("c{n}") })))
        });
        let cache = cache_with(&transport);

        assert_eq!(cache.obtain().await.unwrap().as_str(), "c0");
        cache.invalidate();
        assert_eq!(cache.cached(), None);
        assert_eq!(cache.obtain().await.unwrap().as_str(), "c1");
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let transport = Arc::new(FakeTransport::new(BASE));
        transport.respond(HttpMethod::Get, "/csrf-token", 200, json!({ "token": "x" }));
        let cache = cache_with(&transport);
        assert!(matches!(cache.obtain().await, Err(ApiError::Client(_))));
    }
}
