mod instrumented;
mod mux;

pub use instrumented::*;
pub use mux::*;

use axum::http::Method;
use std::sync::Arc;

use crate::error::Result;
use crate::handler::{Context, Handler, Params, Request};
use crate::writer::ResponseWriter;

/// One method + path template registration.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Trait for method + path routers
pub trait Router: Send + Sync {
    /// Register `handler` for `method` requests matching the `path` template
    fn handle(&mut self, method: Method, path: &str, handler: Arc<dyn Handler>) -> Result<()>;

    /// Find the handler for a concrete request path
    fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<dyn Handler>, Params)>;

    /// Every registration, one entry per method and template
    fn routes(&self) -> Vec<Route>;
}

/// Outcome of [`dispatch`].
#[derive(Debug)]
#[must_use = "an unmatched request still needs an answer"]
pub enum Dispatch {
    Served,
    /// No route for this method and path; the request is handed back as is
    Unmatched(Request),
}

impl Dispatch {
    pub fn is_served(&self) -> bool {
        matches!(self, Self::Served)
    }
}

/// Serve `req` through the handler `router` resolves for it, with the
/// captured path parameters added to `ctx`.
pub async fn dispatch(
    router: &dyn Router,
    ctx: Context,
    w: &mut dyn ResponseWriter,
    req: Request,
) -> Dispatch {
    let Some((handler, params)) = router.lookup(req.method(), req.uri().path()) else {
        tracing::debug!(method = %req.method(), path = %req.uri().path(), "no route");
        return Dispatch::Unmatched(req);
    };
    handler.serve(ctx.with_params(params), w, req).await;
    Dispatch::Served
}
