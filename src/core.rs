use crate::{
    app::AppContext,
    config::Config,
    error::{Result, SubledgerError},
    health,
    http::{PlanRoutes, RouteModule, SubscriptionRoutes, UserRoutes},
    lifecycle::SweeperHandle,
    middleware::MakeRequestUuid,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// The subledger HTTP application
pub struct App {
    router: Router<AppContext>,
    config: Config,
    context: AppContext,
}

impl App {
    /// Assemble the router with every API module and `/health`
    pub fn new(config: Config, context: AppContext) -> Self {
        let router = Router::<AppContext>::new().route("/health", get(health::health_handler));
        let router = UserRoutes.register(router);
        let router = PlanRoutes.register(router);
        let router = SubscriptionRoutes.register(router);

        Self {
            router,
            config,
            context,
        }
    }

    /// Register an additional route module
    pub fn register_module<M: RouteModule>(mut self, module: M) -> Self {
        self.router = module.register(self.router);
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// The fully layered router with state applied
    pub fn into_router(self) -> Router {
        Self::layered(self.router, &self.config).with_state(self.context)
    }

    fn layered(router: Router<AppContext>, config: &Config) -> Router<AppContext> {
        // Outermost last: trace sees the request id, the body limit runs innermost
        router
            .layer(DefaultBodyLimit::max(config.server.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until Ctrl+C or SIGTERM, then stop the sweeper.
    ///
    /// In-flight requests drain before the sweeper is asked to stop, and
    /// the sweeper finishes any sweep already running.
    pub async fn serve(self, sweeper: Option<SweeperHandle>) -> Result<()> {
        let addr = self.config.server.addr().map_err(|e| {
            SubledgerError::configuration(format!("Invalid server address: {}", e))
        })?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| SubledgerError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Health check available at http://{}/health", addr);

        let result = axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| SubledgerError::internal(format!("Server error: {}", e)));

        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }

        tracing::info!("Shutdown complete");
        result
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
