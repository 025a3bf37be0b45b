use crate::access::DataAccess;
use crate::auth::{PasswordHasher, SessionIssuer, SessionVerifier};
use crate::error::{Result, SubledgerError};
use crate::health::{CacheHealthCheck, HealthChecker, StoreHealthCheck};
use crate::lifecycle::SubscriptionService;
use crate::users::UserService;
use std::sync::Arc;

/// Shared state handed to every handler
///
/// Cheap to clone: every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppContext {
    access: DataAccess,
    subscriptions: Arc<SubscriptionService>,
    users: Arc<UserService>,
    sessions: Arc<SessionVerifier>,
    health: Arc<HealthChecker>,
}

impl AppContext {
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    pub fn access(&self) -> &DataAccess {
        &self.access
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn sessions(&self) -> &SessionVerifier {
        &self.sessions
    }

    pub fn health(&self) -> &HealthChecker {
        &self.health
    }
}

/// Builder for AppContext with fluent API
///
/// Only the data access layer and the session keys are required; the
/// password hasher falls back to the default argon2 parameters.
#[must_use = "builder does nothing until you call build()"]
pub struct AppContextBuilder {
    access: Option<DataAccess>,
    hasher: PasswordHasher,
    issuer: Option<SessionIssuer>,
    verifier: Option<SessionVerifier>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            access: None,
            hasher: PasswordHasher::default(),
            issuer: None,
            verifier: None,
        }
    }

    pub fn with_access(mut self, access: DataAccess) -> Self {
        self.access = Some(access);
        self
    }

    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_sessions(mut self, issuer: SessionIssuer, verifier: SessionVerifier) -> Self {
        self.issuer = Some(issuer);
        self.verifier = Some(verifier);
        self
    }

    pub fn build(self) -> Result<AppContext> {
        let access = self
            .access
            .ok_or_else(|| SubledgerError::configuration("AppContext requires a data access layer"))?;
        let (issuer, verifier) = match (self.issuer, self.verifier) {
            (Some(issuer), Some(verifier)) => (issuer, verifier),
            _ => {
                return Err(SubledgerError::configuration(
                    "AppContext requires session signing keys",
                ));
            }
        };

        let health = HealthChecker::new()
            .with_check(Arc::new(StoreHealthCheck::new(access.store().clone())))
            .with_check(Arc::new(CacheHealthCheck::new(access.cache().clone())));

        Ok(AppContext {
            subscriptions: Arc::new(SubscriptionService::new(access.clone())),
            users: Arc::new(UserService::new(access.clone(), self.hasher, issuer)),
            sessions: Arc::new(verifier),
            health: Arc::new(health),
            access,
        })
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::store::InMemoryStore;
    use std::time::Duration;

    fn access() -> DataAccess {
        DataAccess::new(Arc::new(InMemoryStore::new()), Arc::new(InMemoryCache::new(10)))
    }

    #[test]
    fn test_build_requires_access() {
        let result = AppContext::builder()
            .with_sessions(
                SessionIssuer::from_secret(b"k", Duration::from_secs(60)),
                SessionVerifier::from_secret(b"k"),
            )
            .build();
        assert!(matches!(result, Err(SubledgerError::Configuration(_))));
    }

    #[test]
    fn test_build_requires_session_keys() {
        let result = AppContext::builder().with_access(access()).build();
        assert!(matches!(result, Err(SubledgerError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_built_context_shares_one_access_layer() {
        let ctx = AppContext::builder()
            .with_access(access())
            .with_sessions(
                SessionIssuer::from_secret(b"k", Duration::from_secs(60)),
                SessionVerifier::from_secret(b"k"),
            )
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(
            ctx.access().store(),
            ctx.subscriptions().access().store()
        ));
        assert_eq!(ctx.health().check_health().await.checks.len(), 2);
    }
}
