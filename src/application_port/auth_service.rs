use crate::application_port::RefreshError;
use crate::domain_model::AccessToken;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupInput {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Produces a valid bearer token, refreshing it if needed.
///
/// Implementations must collapse concurrent demands into a single refresh:
/// every caller waiting at the same time observes the same outcome.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn ensure_fresh_token(&self) -> Result<AccessToken, RefreshError>;
}
