//! Per-route request instrumentation.
//!
//! An [`Instrumenter`] owns the four metric families for one route label and
//! wraps any number of handlers with them. Each wrapped call records:
//!
//! - `requests_total` (counter; method, code, route)
//! - `request_duration_microseconds` (route)
//! - `request_size_bytes` (route)
//! - `response_size_bytes` (route)
//!
//! With [`RouteLabelMode::ConstLabel`] the route moves out of the variable
//! labels and into each family's constant labels.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{InstrumentOpts, RouteLabelMode};
use crate::error::{MeterError, Result};
use crate::handler::{Context, Handler, Request};
use crate::labels::{sanitize_code, sanitize_method};
use crate::registry::{CounterMetric, DistributionMetric, MetricDesc, MetricsRegistry};
use crate::size::{RequestHead, spawn_estimate, target_len};
use crate::writer::{Observer, ResponseWriter};

const ROUTE_LABEL: &str = "route";

const COUNTER_LABELS: &[&str] = &["method", "code", ROUTE_LABEL];
const ROUTE_LABELS: &[&str] = &[ROUTE_LABEL];
const COUNTER_LABELS_NO_ROUTE: &[&str] = &["method", "code"];
const NO_LABELS: &[&str] = &[];

struct RouteMetrics {
    requests: Arc<dyn CounterMetric>,
    duration: Arc<dyn DistributionMetric>,
    request_size: Arc<dyn DistributionMetric>,
    response_size: Arc<dyn DistributionMetric>,
}

#[derive(Clone)]
pub struct Instrumenter {
    route: Arc<str>,
    mode: RouteLabelMode,
    metrics: Arc<RouteMetrics>,
}

impl Instrumenter {
    /// Fetch or create the four families for `route`. An empty route means
    /// each request is labelled with its own URI path.
    pub fn new(
        registry: &dyn MetricsRegistry,
        route: impl Into<String>,
        opts: &InstrumentOpts,
    ) -> Result<Self> {
        let route = route.into();
        let mode = opts.route_label;

        let mut const_labels = opts.const_labels.clone();
        let (counter_labels, route_labels) = match mode {
            RouteLabelMode::Dimension => (COUNTER_LABELS, ROUTE_LABELS),
            RouteLabelMode::ConstLabel => {
                if route.is_empty() {
                    return Err(MeterError::Config(
                        "const-label route mode needs an explicit route".to_string(),
                    ));
                }
                if const_labels.contains_key(ROUTE_LABEL) {
                    return Err(MeterError::Config(format!(
                        "constant label {ROUTE_LABEL:?} collides with the route label"
                    )));
                }
                const_labels.insert(ROUTE_LABEL.to_string(), route.clone());
                (COUNTER_LABELS_NO_ROUTE, NO_LABELS)
            }
        };

        let desc = |name: &str, help: &str, labels: &[&str]| {
            MetricDesc::new(name, help)
                .namespace(opts.namespace.clone())
                .subsystem(opts.subsystem.clone())
                .const_labels(const_labels.clone())
                .labels(labels)
        };

        let requests = registry.counter(&desc(
            "requests_total",
            "Total number of HTTP requests made.",
            counter_labels,
        ))?;
        let duration = registry.distribution(
            &desc(
                "request_duration_microseconds",
                "The HTTP request latencies in microseconds.",
                route_labels,
            )
            .buckets(opts.duration_buckets.clone()),
        )?;
        let request_size = registry.distribution(
            &desc(
                "request_size_bytes",
                "The HTTP request sizes in bytes.",
                route_labels,
            )
            .buckets(opts.size_buckets.clone()),
        )?;
        let response_size = registry.distribution(
            &desc(
                "response_size_bytes",
                "The HTTP response sizes in bytes.",
                route_labels,
            )
            .buckets(opts.size_buckets.clone()),
        )?;

        tracing::debug!(route = %route, mode = ?mode, "instrumentation ready");

        Ok(Self {
            route: route.into(),
            mode,
            metrics: Arc::new(RouteMetrics {
                requests,
                duration,
                request_size,
                response_size,
            }),
        })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Wrap `handler`. Every wrapper made by one instrumenter shares its
    /// metric families.
    pub fn wrap<H: Handler>(&self, handler: H) -> Instrumented<H> {
        Instrumented {
            inner: handler,
            instrumenter: self.clone(),
        }
    }
}

/// A handler whose every call is measured.
pub struct Instrumented<H> {
    inner: H,
    instrumenter: Instrumenter,
}

impl<H> Instrumented<H> {
    pub fn instrumenter(&self) -> &Instrumenter {
        &self.instrumenter
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

#[async_trait]
impl<H: Handler> Handler for Instrumented<H> {
    async fn serve(&self, ctx: Context, w: &mut dyn ResponseWriter, req: Request) {
        // the head snapshot copies the header map, keep it out of the timing
        let head = RequestHead::from_request(&req);
        let target = target_len(req.uri());

        let start = Instant::now();
        let request_size = spawn_estimate(head, target);
        let method = sanitize_method(req.method().as_str());
        let path = self
            .instrumenter
            .route
            .is_empty()
            .then(|| req.uri().path().to_string());

        let mut observer = Observer::new(w);
        self.inner.serve(ctx, observer.writer(), req).await;

        let elapsed_us = start.elapsed().as_secs_f64() * 1_000_000.0;
        let observed = observer.observation();

        let route = path.as_deref().unwrap_or(&self.instrumenter.route);
        let code = sanitize_code(observed.status_code());

        // route is the trailing value of every label set, dropped when it
        // lives in the constant labels instead
        let values = [&*method, &*code, route];
        let (counter_values, route_values) = match self.instrumenter.mode {
            RouteLabelMode::Dimension => (&values[..], &values[2..]),
            RouteLabelMode::ConstLabel => (&values[..2], &values[3..]),
        };

        let metrics = &self.instrumenter.metrics;
        metrics.requests.inc(counter_values);
        metrics.duration.observe(route_values, elapsed_us);
        metrics
            .response_size
            .observe(route_values, observed.written as f64);

        match request_size.await {
            Ok(size) => metrics.request_size.observe(route_values, size as f64),
            Err(_) => tracing::warn!(route, "request size estimate lost"),
        }

        tracing::trace!(
            route,
            method = %method,
            code = %code,
            elapsed_us,
            written = observed.written,
            "request instrumented"
        );
    }
}
