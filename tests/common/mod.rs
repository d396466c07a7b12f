#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokenpipe::application_impl::SessionContext;
use tokenpipe::application_port::{ClientConfig, TerminationReason};
use tokenpipe::domain_model::HttpMethod;
use tokenpipe::domain_port::{KeyValueStore, StoreError, TransportResponse};
use tokenpipe::infra::{FakeTransport, MemoryKeyValueStore};

pub const BASE: &str = "http://api.test";

/// Memory store that counts how often the access token is removed.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryKeyValueStore,
    pub token_removals: AtomicUsize,
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if key == "accessToken" {
            self.token_removals.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.remove(key)
    }
}

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub store: Arc<CountingStore>,
    pub ctx: SessionContext,
    pub terminations: Arc<Mutex<Vec<TerminationReason>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(CountingStore::default()))
    }

    /// Start as if a previous run left `token` in storage.
    pub fn with_token(token: &str) -> Self {
        let store = Arc::new(CountingStore::default());
        store.set("accessToken", token).unwrap();
        Self::with_store(store)
    }

    pub fn with_store(store: Arc<CountingStore>) -> Self {
        let transport = Arc::new(FakeTransport::new(BASE));
        transport.route(HttpMethod::Get, "/csrf-token", |_, n| {
            Ok(TransportResponse::json(
                200,
                &json!({ "csrfToken": format!("csrf-{n}") }),
            ))
        });

        let ctx = SessionContext::new(
            ClientConfig::with_base_url(BASE),
            transport.clone(),
            store.clone(),
        )
        .unwrap();

        let terminations = Arc::new(Mutex::new(Vec::new()));
        let sink = terminations.clone();
        ctx.on_session_terminated(move |reason: &TerminationReason| {
            sink.lock().unwrap().push(reason.clone());
        });

        Self {
            transport,
            store,
            ctx,
            terminations,
        }
    }

    pub fn terminations(&self) -> Vec<TerminationReason> {
        self.terminations.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.transport.count(HttpMethod::Post, "/auth/refresh")
    }

    pub fn csrf_calls(&self) -> usize {
        self.transport.count(HttpMethod::Get, "/csrf-token")
    }
}

pub fn grant(token: &str, expires_in: u64) -> Value {
    json!({
        "accessToken": token,
        "expiresIn": expires_in,
        "user": { "id": "u1", "email": "ada@example.com" },
    })
}

/// 200 with `body` when the request carries `Bearer <token>`, 401 otherwise.
pub fn require_bearer(
    transport: &FakeTransport,
    method: HttpMethod,
    path: &str,
    token: &'static str,
    body: Value,
) {
    let expected = format!("Bearer {token}");
    transport.route(method, path, move |req, _| {
        if req.header("Authorization") == Some(expected.as_str()) {
            Ok(TransportResponse::json(200, &body))
        } else {
            Ok(TransportResponse::json(
                401,
                &json!({ "code": "TOKEN_EXPIRED", "message": "jwt expired" }),
            ))
        }
    });
}
