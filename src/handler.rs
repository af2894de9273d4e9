use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::writer::ResponseWriter;

pub type Request = axum::extract::Request;

/// Path parameters captured by the router, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Per-request context handed to every handler alongside the request.
#[derive(Debug, Clone, Default)]
pub struct Context {
    params: Params,
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cancellation is signalled by sending `true` on the paired sender.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        let cancelled = self.cancel.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        cancelled || expired
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Never resolves for a context with neither.
    pub async fn done(&self) {
        let cancelled = async {
            match self.cancel.clone() {
                Some(mut rx) => {
                    if rx.wait_for(|c| *c).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancelled => {},
            _ = expired => {},
        }
    }
}

#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn serve(&self, ctx: Context, w: &mut dyn ResponseWriter, req: Request);
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn serve(&self, ctx: Context, w: &mut dyn ResponseWriter, req: Request) {
        (**self).serve(ctx, w, req).await
    }
}

/// Handler backed by a closure returning a boxed future.
pub struct HandlerFn<F>(F);

/// Build a handler from a closure:
///
/// ```ignore
/// let h = handler_fn(|_ctx, w, _req| Box::pin(async move {
///     let _ = w.write(b"pong").await;
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'w> Fn(Context, &'w mut dyn ResponseWriter, Request) -> BoxFuture<'w, ()>
        + Send
        + Sync
        + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'w> Fn(Context, &'w mut dyn ResponseWriter, Request) -> BoxFuture<'w, ()>
        + Send
        + Sync
        + 'static,
{
    async fn serve(&self, ctx: Context, w: &mut dyn ResponseWriter, req: Request) {
        (self.0)(ctx, w, req).await
    }
}
