use super::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Short-lived bearer credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Body of a successful login, signup or refresh response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: AccessToken,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    #[serde(default)]
    pub user: Option<User>,
}

impl TokenGrant {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

/// Logical authentication state of the running client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<AccessToken>,
    pub user: Option<User>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Time left before the access token expires, zero once it has.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at?;
        Some((expires_at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn debug_hides_token() {
        let token = AccessToken::new("secret-value");
        assert!(!format!("{token:?}").contains("secret-value"));
        assert_eq!(token.bearer(), "Bearer secret-value");
    }

    #[test]
    fn grant_parses_camel_case() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{"accessToken":"t1","expiresIn":900,"user":{"id":"u1"}}"#,
        )
        .unwrap();
        assert_eq!(grant.access_token.as_str(), "t1");
        assert_eq!(grant.lifetime(), Duration::from_secs(900));
        assert_eq!(grant.user.map(|u| u.id.0), Some("u1".to_string()));
    }

    #[test]
    fn remaining_lifetime_saturates_at_zero() {
        let now = Utc::now();
        let session = Session {
            access_token: Some(AccessToken::new("t")),
            user: None,
            expires_at: Some(now - TimeDelta::seconds(5)),
        };
        assert_eq!(session.remaining_lifetime(now), Some(Duration::ZERO));
        assert_eq!(Session::default().remaining_lifetime(now), None);
    }
}
