use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

const ACCESS_TOKEN_KEY: &str = "accessToken";
const USER_KEY: &str = "user";
const EXPIRES_AT_KEY: &str = "expiresAt";

/// The current session, mirrored into a persistent [`KeyValueStore`].
///
/// Reads are served from memory. Write failures of the backing store are
/// logged and do not fail the caller: the in-memory session stays
/// authoritative for the lifetime of the process.
///
/// Every [`clear`](Self::clear) starts a new epoch. Work that began under an
/// older epoch can no longer install a grant.
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    session: RwLock<Session>,
    epoch: AtomicU64,
}

impl CredentialStore {
    /// Load whatever session a previous run left behind.
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let access_token = backend.get(ACCESS_TOKEN_KEY)?.map(AccessToken::new);
        let user = backend.get(USER_KEY)?.and_then(|raw| {
            serde_json::from_str::<User>(&raw)
                .inspect_err(|e| warn!("ignoring unreadable stored user: {e}"))
                .ok()
        });
        let expires_at = backend.get(EXPIRES_AT_KEY)?.and_then(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .inspect_err(|e| warn!("ignoring unreadable stored expiry: {e}"))
                .ok()
                .map(|t| t.with_timezone(&Utc))
        });

        Ok(Self {
            backend,
            session: RwLock::new(Session {
                access_token,
                user,
                expires_at,
            }),
            epoch: AtomicU64::new(0),
        })
    }

    pub fn session(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    pub fn user(&self) -> Option<User> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    /// Epoch of the current session; changes on every clear.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Install a fresh grant. A grant without a user record keeps the
    /// previously stored user.
    pub fn save_grant(&self, grant: &TokenGrant) -> Session {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        self.install(&mut session, grant)
    }

    /// Install `grant` only if the session was not cleared since `epoch`.
    pub fn save_grant_if_current(&self, epoch: u64, grant: &TokenGrant) -> Option<Session> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if self.epoch() != epoch {
            return None;
        }
        Some(self.install(&mut session, grant))
    }

    pub fn clear(&self) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        self.wipe(&mut session);
    }

    /// Clear only if nothing else cleared the session since `epoch`.
    pub fn clear_if_current(&self, epoch: u64) -> bool {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if self.epoch() != epoch {
            return false;
        }
        self.wipe(&mut session);
        true
    }

    fn wipe(&self, session: &mut Session) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *session = Session::default();
        for key in [ACCESS_TOKEN_KEY, USER_KEY, EXPIRES_AT_KEY] {
            self.persist(key, None);
        }
    }

    // Persisting under the session lock keeps the backend in step with memory.
    fn install(&self, session: &mut Session, grant: &TokenGrant) -> Session {
        let expires_at = i64::try_from(grant.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        session.access_token = Some(grant.access_token.clone());
        if let Some(user) = &grant.user {
            session.user = Some(user.clone());
        }
        session.expires_at = expires_at;

        self.persist(ACCESS_TOKEN_KEY, Some(grant.access_token.as_str().to_owned()));
        self.persist(
            USER_KEY,
            session
                .user
                .as_ref()
                .and_then(|u| serde_json::to_string(u).ok()),
        );
        self.persist(EXPIRES_AT_KEY, expires_at.map(|t| t.to_rfc3339()));
        session.clone()
    }

    fn persist(&self, key: &str, value: Option<String>) {
        let result = match value {
            Some(value) => self.backend.set(key, &value),
            None => self.backend.remove(key),
        };
        if let Err(e) = result {
            warn!(key, "failed to persist credential: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryKeyValueStore;

    fn grant(token: &str, user: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: AccessToken::new(token),
            expires_in: 900,
            user: user.map(User::new),
        }
    }

    #[test]
    fn saved_session_is_reloaded() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let store = CredentialStore::load(backend.clone()).unwrap();
        assert!(!store.session().is_authenticated());

        store.save_grant(&grant("t1", Some("u1")));

        let reloaded = CredentialStore::load(backend).unwrap();
        let session = reloaded.session();
        assert_eq!(session.access_token, Some(AccessToken::new("t1")));
        assert_eq!(session.user.map(|u| u.id.0), Some("u1".to_string()));
        assert!(session.expires_at.is_some());
    }

    #[test]
    fn grant_without_user_keeps_previous_user() {
        let store = CredentialStore::load(Arc::new(MemoryKeyValueStore::new())).unwrap();
        store.save_grant(&grant("t1", Some("u1")));
        store.save_grant(&grant("t2", None));

        assert_eq!(store.access_token(), Some(AccessToken::new("t2")));
        assert_eq!(store.user().map(|u| u.id.0), Some("u1".to_string()));
    }

    #[test]
    fn clear_removes_persisted_keys() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let store = CredentialStore::load(backend.clone()).unwrap();
        store.save_grant(&grant("t1", Some("u1")));
        store.clear();

        assert_eq!(store.session(), Session::default());
        assert_eq!(backend.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(backend.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn grant_from_before_a_clear_is_discarded() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let store = CredentialStore::load(backend.clone()).unwrap();
        store.save_grant(&grant("t1", Some("u1")));
        let epoch = store.epoch();

        store.clear();

        assert_eq!(store.save_grant_if_current(epoch, &grant("t2", None)), None);
        assert_eq!(store.access_token(), None);
        assert_eq!(backend.get(ACCESS_TOKEN_KEY).unwrap(), None);

        let current = store.epoch();
        let session = store.save_grant_if_current(current, &grant("t3", Some("u1")));
        assert_eq!(session.and_then(|s| s.access_token), Some(AccessToken::new("t3")));
    }

    #[test]
    fn unreadable_user_is_dropped() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        backend.set(ACCESS_TOKEN_KEY, "t1").unwrap();
        backend.set(USER_KEY, "{not json").unwrap();

        let store = CredentialStore::load(backend).unwrap();
        assert_eq!(store.access_token(), Some(AccessToken::new("t1")));
        assert_eq!(store.user(), None);
    }
}
