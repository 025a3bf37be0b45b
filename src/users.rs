//! Registration and credential issuance.

use crate::access::DataAccess;
use crate::auth::{PasswordHasher, SessionIssuer};
use crate::error::{Result, SubledgerError};
use crate::models::{NewUser, User};

/// A freshly registered user and their first session token
#[derive(Debug, Clone)]
pub struct Registered {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct UserService {
    access: DataAccess,
    hasher: PasswordHasher,
    issuer: SessionIssuer,
}

impl UserService {
    pub fn new(access: DataAccess, hasher: PasswordHasher, issuer: SessionIssuer) -> Self {
        Self {
            access,
            hasher,
            issuer,
        }
    }

    /// Create a user and sign them in.
    ///
    /// The token is also cached under the user's session key; failing to
    /// cache it does not fail the registration.
    pub async fn register(&self, name: String, password: String) -> Result<Registered> {
        // Argon2 is deliberately slow, keep it off the async workers
        let hasher = self.hasher.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| SubledgerError::internal(format!("Password hashing task failed: {}", e)))??;

        let user = self
            .access
            .insert_user(NewUser {
                name,
                password_hash,
            })
            .await?;

        let token = self.issuer.issue(user.id)?;
        self.access
            .cache_session_token(user.id, &token, self.issuer.ttl())
            .await;

        tracing::info!(user_id = user.id, "User registered");
        Ok(Registered { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordConfig, SessionVerifier};
    use crate::cache::InMemoryCache;
    use crate::store::InMemoryStore;
    use crate::testing::doubles::{RecordingCache, UnreachableCache};
    use crate::traits::cache::{Cache, CacheExt};
    use std::sync::Arc;
    use std::time::Duration;

    const SECRET: &[u8] = b"users-test-secret";
    const DAY: Duration = Duration::from_secs(86_400);

    fn service(store: InMemoryStore, cache: Arc<dyn Cache>) -> UserService {
        UserService::new(
            DataAccess::new(Arc::new(store), cache),
            PasswordHasher::new(PasswordConfig::fast()),
            SessionIssuer::from_secret(SECRET, DAY),
        )
    }

    #[tokio::test]
    async fn test_register_hashes_password_and_issues_token() {
        let store = InMemoryStore::new();
        let cache = Arc::new(InMemoryCache::new(100));
        let users = service(store.clone(), cache.clone());

        let registered = users
            .register("ada".to_string(), "hunter22".to_string())
            .await
            .unwrap();

        let stored = store.get_user(registered.user.id).await.unwrap();
        assert_ne!(stored.password_hash, "hunter22");
        assert!(
            PasswordHasher::default()
                .verify("hunter22", &stored.password_hash)
                .unwrap()
        );

        let claims = SessionVerifier::from_secret(SECRET)
            .verify(&registered.token)
            .unwrap();
        assert_eq!(claims.user_id, registered.user.id);

        let cached: Option<String> = cache
            .get(&format!("user:{}:session", registered.user.id))
            .await
            .unwrap();
        assert_eq!(cached.as_deref(), Some(registered.token.as_str()));
    }

    #[tokio::test]
    async fn test_token_cached_for_token_lifetime() {
        let cache = Arc::new(RecordingCache::new());
        let users = service(InMemoryStore::new(), cache.clone());

        let registered = users.register("bo".into(), "pw".into()).await.unwrap();

        assert_eq!(
            cache.ttl_for(&format!("user:{}:session", registered.user.id)),
            Some(Some(DAY))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_outage_does_not_fail_registration() {
        let users = service(InMemoryStore::new(), Arc::new(UnreachableCache::new()));
        let registered = users.register("cy".into(), "pw".into()).await.unwrap();
        assert!(!registered.token.is_empty());
    }
}
