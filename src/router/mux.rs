use axum::http::Method;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Route, Router};
use crate::error::{MeterError, Result};
use crate::handler::{Handler, Params};

struct Endpoint {
    path: String,
    handlers: HashMap<Method, Arc<dyn Handler>>,
}

/// Method + path router on `matchit`, the matcher behind `axum::Router`.
///
/// Templates use axum's syntax: `{name}` captures one segment and a final
/// `{*name}` captures the rest of the path. Literal segments take priority
/// over captures. Templates that would conflict inside axum are rejected at
/// registration, so a `Mux` can always be mounted with
/// [`crate::server::service`].
pub struct Mux {
    matcher: matchit::Router<usize>,
    endpoints: Vec<Endpoint>,
}

impl Mux {
    pub fn new() -> Self {
        Self {
            matcher: matchit::Router::new(),
            endpoints: Vec::new(),
        }
    }

    /// Registered templates, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|e| e.path.as_str())
    }
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl Router for Mux {
    fn handle(&mut self, method: Method, path: &str, handler: Arc<dyn Handler>) -> Result<()> {
        if let Some(endpoint) = self.endpoints.iter_mut().find(|e| e.path == path) {
            if endpoint.handlers.insert(method.clone(), handler).is_some() {
                tracing::warn!(method = %method, path, "replacing existing route handler");
            }
            return Ok(());
        }

        validate(path)?;
        self.matcher
            .insert(path, self.endpoints.len())
            .map_err(|e| MeterError::invalid_pattern(path, e.to_string()))?;

        tracing::debug!(method = %method, path, "route registered");
        let mut handlers = HashMap::new();
        handlers.insert(method, handler);
        self.endpoints.push(Endpoint {
            path: path.to_string(),
            handlers,
        });
        Ok(())
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<dyn Handler>, Params)> {
        let matched = self.matcher.at(path).ok()?;
        let handler = self.endpoints.get(*matched.value)?.handlers.get(method)?;

        let mut params = Params::new();
        for (name, value) in matched.params.iter() {
            params.push(name, value);
        }
        Some((handler.clone(), params))
    }

    fn routes(&self) -> Vec<Route> {
        self.endpoints
            .iter()
            .flat_map(|endpoint| {
                endpoint.handlers.iter().map(|(method, handler)| Route {
                    method: method.clone(),
                    path: endpoint.path.clone(),
                    handler: handler.clone(),
                })
            })
            .collect()
    }
}

/// The template checks `axum::Router::route` panics on, as errors.
fn validate(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(MeterError::invalid_pattern(path, "must start with '/'"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(MeterError::invalid_pattern(
            path,
            "captures are written {name} and {*name}",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Context, Request, handler_fn};
    use crate::writer::MockWriter;
    use axum::body::Body;

    fn tagged(tag: &'static str) -> Arc<dyn Handler> {
        Arc::new(handler_fn(move |_ctx, w, _req| {
            Box::pin(async move {
                let _ = w.write(tag.as_bytes()).await;
            })
        }))
    }

    async fn run(mux: &Mux, method: Method, path: &str) -> Option<(String, Params)> {
        let (handler, params) = mux.lookup(&method, path)?;
        let mut w = MockWriter::new();
        handler
            .serve(Context::new(), &mut w, Request::new(Body::empty()))
            .await;
        Some((String::from_utf8_lossy(w.body()).into_owned(), params))
    }

    #[tokio::test]
    async fn test_static_and_param_routes() {
        let mut mux = Mux::new();
        mux.handle(Method::GET, "/", tagged("root")).unwrap();
        mux.handle(Method::GET, "/items", tagged("list")).unwrap();
        mux.handle(Method::GET, "/items/{id}", tagged("item")).unwrap();

        assert_eq!(run(&mux, Method::GET, "/").await.unwrap().0, "root");
        assert_eq!(run(&mux, Method::GET, "/items").await.unwrap().0, "list");

        let (tag, params) = run(&mux, Method::GET, "/items/42").await.unwrap();
        assert_eq!(tag, "item");
        assert_eq!(params.get("id"), Some("42"));

        assert!(mux.lookup(&Method::GET, "/items/42/extra").is_none());
        assert!(mux.lookup(&Method::POST, "/items").is_none());
    }

    #[tokio::test]
    async fn test_literal_beats_capture() {
        let mut mux = Mux::new();
        mux.handle(Method::GET, "/files/{name}", tagged("one")).unwrap();
        mux.handle(Method::GET, "/files/readme", tagged("readme")).unwrap();
        mux.handle(Method::GET, "/assets/{*path}", tagged("any")).unwrap();

        assert_eq!(run(&mux, Method::GET, "/files/readme").await.unwrap().0, "readme");
        assert_eq!(run(&mux, Method::GET, "/files/notes").await.unwrap().0, "one");

        let (tag, params) = run(&mux, Method::GET, "/assets/css/site.css").await.unwrap();
        assert_eq!(tag, "any");
        assert_eq!(params.get("path"), Some("css/site.css"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces() {
        let mut mux = Mux::new();
        mux.handle(Method::GET, "/dup", tagged("first")).unwrap();
        mux.handle(Method::GET, "/dup", tagged("second")).unwrap();
        mux.handle(Method::PUT, "/dup", tagged("put")).unwrap();

        assert_eq!(mux.patterns().count(), 1);
        assert_eq!(mux.routes().len(), 2);
        assert_eq!(run(&mux, Method::GET, "/dup").await.unwrap().0, "second");
        assert_eq!(run(&mux, Method::PUT, "/dup").await.unwrap().0, "put");
    }

    #[test]
    fn test_invalid_patterns() {
        let mut mux = Mux::new();
        for pattern in ["items", "", "/a/:id", "/a/*rest", "/a/{*rest}/b"] {
            let err = mux
                .handle(Method::GET, pattern, tagged("x"))
                .err()
                .unwrap();
            assert!(
                matches!(err, MeterError::InvalidPattern { .. }),
                "{pattern} gave {err:?}"
            );
        }
        assert_eq!(mux.patterns().count(), 0);
    }

    #[test]
    fn test_conflicting_captures_rejected() {
        let mut mux = Mux::new();
        mux.handle(Method::GET, "/users/{id}", tagged("a")).unwrap();
        let err = mux
            .handle(Method::GET, "/users/{name}", tagged("b"))
            .err()
            .unwrap();
        assert!(matches!(err, MeterError::InvalidPattern { .. }));
        assert_eq!(mux.patterns().collect::<Vec<_>>(), vec!["/users/{id}"]);
    }
}
