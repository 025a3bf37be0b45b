use crate::app::AppContext;
use axum::Router;

/// A group of routes mounted on the application router
///
/// Handlers take `State<AppContext>`; the state is supplied once by
/// [`App`](crate::App) after all modules are registered.
pub trait RouteModule {
    fn routes(&self) -> Router<AppContext>;

    /// Path prefix the routes are nested under, if any
    fn prefix(&self) -> Option<&str> {
        None
    }

    fn register(self, router: Router<AppContext>) -> Router<AppContext>
    where
        Self: Sized,
    {
        let routes = self.routes();

        match self.prefix() {
            Some(prefix) => router.nest(prefix, routes),
            None => router.merge(routes),
        }
    }
}
