use crate::access::DataAccess;
use crate::app::AppContext;
use crate::auth::{PasswordConfig, PasswordHasher, SessionIssuer, SessionVerifier};
use crate::cache::InMemoryCache;
use crate::config::{Config, ConfigBuilder};
use crate::core::App;
use crate::lifecycle::ExpirySweeper;
use crate::models::Plan;
use crate::store::{InMemoryStore, SubscriptionStore};
use crate::traits::cache::Cache;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

const TEST_SECRET: &str = "subledger-test-secret";
const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A fully wired application over in-memory backends
///
/// Uses cheap argon2 parameters and a fixed signing secret so tests can
/// mint tokens directly with [`token_for`](Self::token_for).
pub struct TestApp {
    config: Config,
    context: AppContext,
    issuer: SessionIssuer,
    store: InMemoryStore,
}

impl TestApp {
    /// Empty catalog, no users
    pub async fn new() -> Self {
        Self::with_plans(Vec::new()).await
    }

    pub async fn with_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
        let store = InMemoryStore::with_plans(plans).await;
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(1_000));
        Self::build(store.clone(), Arc::new(store), cache)
    }

    /// Wire the app over arbitrary backends, e.g. failure-injecting doubles.
    ///
    /// `seed` is the in-memory store the doubles wrap; it is what
    /// [`store`](Self::store) returns.
    pub fn with_backends(
        seed: InMemoryStore,
        store: Arc<dyn SubscriptionStore>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self::build(seed, store, cache)
    }

    fn build(seed: InMemoryStore, store: Arc<dyn SubscriptionStore>, cache: Arc<dyn Cache>) -> Self {
        let config = ConfigBuilder::new()
            .with_jwt_secret(TEST_SECRET)
            .with_token_ttl(TOKEN_TTL)
            .build()
            .unwrap();
        let issuer = SessionIssuer::from_config(&config.auth).unwrap();

        let context = AppContext::builder()
            .with_access(DataAccess::new(store, cache))
            .with_password_hasher(PasswordHasher::new(PasswordConfig::fast()))
            .with_sessions(
                issuer.clone(),
                SessionVerifier::from_config(&config.auth).unwrap(),
            )
            .build()
            .unwrap();

        Self {
            config,
            context,
            issuer,
            store: seed,
        }
    }

    /// A fresh layered router sharing this app's state
    pub fn router(&self) -> Router {
        App::new(self.config.clone(), self.context.clone()).into_router()
    }

    /// A valid bearer token for `user_id`
    pub fn token_for(&self, user_id: i64) -> String {
        self.issuer.issue(user_id).unwrap()
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn access(&self) -> &DataAccess {
        self.context.access()
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// A sweeper over the same data access layer, for driving expiry by hand
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(self.access().clone(), self.config.sweep.interval())
    }
}
