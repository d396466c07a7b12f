use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Create, update and delete calls must carry a CSRF token.
    pub fn is_state_changing(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical API call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(HttpMethod::Patch, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path with any query string removed.
    pub fn route(&self) -> &str {
        self.path
            .split_once('?')
            .map(|(route, _)| route)
            .unwrap_or(&self.path)
    }
}

/// How many CSRF-triggered retries a single call may still perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget(u8);

impl RetryBudget {
    pub const NONE: RetryBudget = RetryBudget(0);

    pub fn new(retries: u8) -> Self {
        Self(retries)
    }

    pub fn remaining(&self) -> u8 {
        self.0
    }

    /// The budget left after one retry, or `None` if it is already spent.
    pub fn spend(self) -> Option<RetryBudget> {
        self.0.checked_sub(1).map(RetryBudget)
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_get_is_safe() {
        assert!(!HttpMethod::Get.is_state_changing());
        for method in [
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
        ] {
            assert!(method.is_state_changing(), "{method}");
        }
    }

    #[test]
    fn default_budget_allows_exactly_one_retry() {
        let budget = RetryBudget::default();
        let after = budget.spend().unwrap();
        assert_eq!(after, RetryBudget::NONE);
        assert_eq!(after.spend(), None);
    }

    #[test]
    fn route_drops_query() {
        assert_eq!(ApiRequest::get("/people?page=2").route(), "/people");
        assert_eq!(ApiRequest::get("/people").route(), "/people");
    }
}
