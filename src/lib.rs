pub mod config;
pub mod error;
pub mod handler;
pub mod instrument;
pub mod labels;
pub mod observability;
pub mod registry;
pub mod router;
pub mod server;
pub mod size;
pub mod writer;

pub use config::*;
pub use error::{MeterError, Result};
pub use handler::{Context, Handler, Params, handler_fn};
pub use instrument::{Instrumented, Instrumenter};
pub use registry::{MetricsRegistry, MockRegistry, PrometheusRegistry};
pub use router::{Dispatch, InstrumentedRouter, Mux, Route, Router};
