//! Mounting a [`Router`] on axum.
//!
//! Every registration becomes an `axum::Router::route` entry, so axum
//! answers unknown paths with 404 and unregistered methods with 405 and an
//! `Allow` header. Path captures reach handlers as [`Context`] params.
//!
//! Handlers write into a [`BufferedResponse`]. It offers flush, which has no
//! effect until the response is handed back to axum, and `read_from`, but
//! neither close notification nor hijacking. Instrumented handlers served
//! here therefore always get the plain observer. The capability-preserving
//! observer needs a host writer with all four capabilities.

use axum::extract::RawPathParams;
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter};
use std::collections::BTreeMap;

use crate::handler::{Context, Handler, Params, Request};
use crate::router::Router;
use crate::writer::BufferedResponse;

/// Build an `axum::Router` from the routes registered on `router` so far.
///
/// Methods axum has no [`MethodFilter`] for are skipped with a warning.
/// Panics, like `axum::Router::route`, if two templates conflict; [`Mux`]
/// rejects those at registration.
///
/// [`Mux`]: crate::router::Mux
pub fn service<R: Router + ?Sized>(router: &R) -> axum::Router {
    let mut paths: BTreeMap<String, MethodRouter> = BTreeMap::new();

    for route in router.routes() {
        let Ok(filter) = MethodFilter::try_from(route.method.clone()) else {
            tracing::warn!(method = %route.method, path = %route.path, "method not routable by axum, skipping");
            continue;
        };

        let handler = route.handler;
        let endpoint = move |raw: RawPathParams, req: Request| {
            let handler = handler.clone();
            let mut params = Params::new();
            for (name, value) in raw.iter() {
                params.push(name, value);
            }
            async move { respond(handler.as_ref(), Context::new().with_params(params), req).await }
        };

        let methods = paths.remove(&route.path).unwrap_or_else(MethodRouter::new);
        paths.insert(route.path, methods.on(filter, endpoint));
    }

    paths
        .into_iter()
        .fold(axum::Router::new(), |app, (path, methods)| app.route(&path, methods))
}

/// Run one request through `handler`, buffering the whole response.
pub async fn respond(handler: &dyn Handler, ctx: Context, req: Request) -> Response {
    let mut w = BufferedResponse::new();
    handler.serve(ctx, &mut w, req).await;
    w.into_response()
}
