use axum::http::Method;
use std::sync::Arc;

use super::{Dispatch, Mux, Route, Router, dispatch};
use crate::config::InstrumentOpts;
use crate::error::Result;
use crate::handler::{Context, Handler, Params, Request};
use crate::instrument::Instrumenter;
use crate::registry::{MetricsRegistry, PrometheusRegistry};
use crate::writer::ResponseWriter;

const DEFAULT_SUBSYSTEM: &str = "http";

/// A router that instruments every handler registered on it, labelled by
/// the path template it was registered under.
pub struct InstrumentedRouter<R = Mux> {
    router: R,
    registry: Arc<dyn MetricsRegistry>,
    opts: InstrumentOpts,
}

impl InstrumentedRouter<Mux> {
    /// Fresh [`Mux`] reporting to the process-wide Prometheus registry.
    pub fn new() -> Self {
        Self::with_opts(PrometheusRegistry::global(), InstrumentOpts::default())
    }

    pub fn with_opts(registry: Arc<dyn MetricsRegistry>, opts: InstrumentOpts) -> Self {
        Self::wrap(Mux::new(), registry, opts)
    }
}

impl Default for InstrumentedRouter<Mux> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Router> InstrumentedRouter<R> {
    /// Instrument an existing router. An empty subsystem becomes `http`.
    pub fn wrap(router: R, registry: Arc<dyn MetricsRegistry>, mut opts: InstrumentOpts) -> Self {
        if opts.subsystem.is_empty() {
            opts.subsystem = DEFAULT_SUBSYSTEM.to_string();
        }
        Self {
            router,
            registry,
            opts,
        }
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> Result<()> {
        self.register(Method::GET, path, Arc::new(handler))
    }

    pub fn head(&mut self, path: &str, handler: impl Handler) -> Result<()> {
        self.register(Method::HEAD, path, Arc::new(handler))
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> Result<()> {
        self.register(Method::OPTIONS, path, Arc::new(handler))
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> Result<()> {
        self.register(Method::PATCH, path, Arc::new(handler))
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> Result<()> {
        self.register(Method::POST, path, Arc::new(handler))
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> Result<()> {
        self.register(Method::PUT, path, Arc::new(handler))
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> Result<()> {
        self.register(Method::DELETE, path, Arc::new(handler))
    }

    pub fn handle(&mut self, method: Method, path: &str, handler: impl Handler) -> Result<()> {
        self.register(method, path, Arc::new(handler))
    }

    /// Serve `req` through the wrapped router.
    pub async fn serve(&self, ctx: Context, w: &mut dyn ResponseWriter, req: Request) -> Dispatch {
        dispatch(self, ctx, w, req).await
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn opts(&self) -> &InstrumentOpts {
        &self.opts
    }

    pub fn into_inner(self) -> R {
        self.router
    }

    fn register(&mut self, method: Method, path: &str, handler: Arc<dyn Handler>) -> Result<()> {
        let instrumenter = Instrumenter::new(self.registry.as_ref(), path, &self.opts)?;
        tracing::debug!(method = %method, path, "instrumenting route");
        self.router
            .handle(method, path, Arc::new(instrumenter.wrap(handler)))
    }
}

impl<R: Router> Router for InstrumentedRouter<R> {
    fn handle(&mut self, method: Method, path: &str, handler: Arc<dyn Handler>) -> Result<()> {
        self.register(method, path, handler)
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<dyn Handler>, Params)> {
        self.router.lookup(method, path)
    }

    fn routes(&self) -> Vec<Route> {
        self.router.routes()
    }
}
