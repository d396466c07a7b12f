//! Scripted in-process transport. Routes are matched on method and path
//! (query stripped); every request is recorded for later inspection.

use crate::domain_model::HttpMethod;
use crate::domain_port::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Builds the response for the `n`th request (zero-based) to a route.
pub type Responder =
    Box<dyn Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError> + Send + Sync>;

struct Route {
    responder: Responder,
    latency: Duration,
    hits: usize,
}

pub struct FakeTransport {
    base_url: String,
    routes: Mutex<HashMap<(HttpMethod, String), Route>>,
    log: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            routes: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn route<F>(&self, method: HttpMethod, path: &str, responder: F)
    where
        F: Fn(&TransportRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.insert(
            (method, path.to_owned()),
            Route {
                responder: Box::new(responder),
                latency: Duration::ZERO,
                hits: 0,
            },
        );
    }

    /// Always answer `status` with `body`.
    pub fn respond(&self, method: HttpMethod, path: &str, status: u16, body: serde_json::Value) {
        self.route(method, path, move |_, _| {
            Ok(TransportResponse::json(status, &body))
        });
    }

    /// Delay responses on an existing route.
    pub fn set_latency(&self, method: HttpMethod, path: &str, latency: Duration) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(route) = routes.get_mut(&(method, path.to_owned())) {
            route.latency = latency;
        }
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && self.route_of(&r.url) == path)
            .collect()
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    fn route_of<'a>(&self, url: &'a str) -> &'a str {
        let path = url.strip_prefix(self.base_url.as_str()).unwrap_or(url);
        path.split_once('?').map(|(p, _)| p).unwrap_or(path)
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let key = (request.method, self.route_of(&request.url).to_owned());
        let (result, latency) = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            match routes.get_mut(&key) {
                Some(route) => {
                    let n = route.hits;
                    route.hits += 1;
                    ((route.responder)(&request, n), route.latency)
                }
                None => (
                    Ok(TransportResponse::json(
                        404,
                        &json!({ "code": "NOT_FOUND", "message": format!("no route {} {}", key.0, key.1) }),
                    )),
                    Duration::ZERO,
                ),
            }
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }
}
