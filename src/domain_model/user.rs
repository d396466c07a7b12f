use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Server-assigned user identifier. Accepts both JSON strings and integers.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => UserId(s),
            Raw::Number(n) => UserId(n.to_string()),
        })
    }
}

/// The user record returned alongside every token grant.
///
/// Only `id` is required; anything else the server sends is kept in `extra`
/// so it survives a round trip through the credential store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            email: None,
            name: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_are_accepted() {
        let user: User = serde_json::from_value(json!({ "id": 42, "email": "a@b.c" })).unwrap();
        assert_eq!(user.id, UserId("42".into()));
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn unknown_fields_are_kept() {
        let user: User =
            serde_json::from_value(json!({ "id": "u1", "role": "admin", "orgId": 7 })).unwrap();
        assert_eq!(user.extra.get("role"), Some(&json!("admin")));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back, json!({ "id": "u1", "role": "admin", "orgId": 7 }));
    }
}
