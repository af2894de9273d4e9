//! The metrics registry seam.
//!
//! The instrumentation only needs get-or-create for two metric kinds and
//! thread-safe `inc`/`observe` on the handles it gets back. Storage,
//! aggregation and exposition belong to the implementation.

mod mock;
mod prom;

pub use mock::*;
pub use prom::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MeterError, Result};

/// Description of one labelled metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDesc {
    pub namespace: String,
    pub subsystem: String,
    pub name: String,
    pub help: String,
    pub const_labels: BTreeMap<String, String>,
    /// Variable label names, in the order values are passed to `inc`/`observe`
    pub label_names: Vec<String>,
    /// Distribution bucket bounds; ignored for counters
    pub buckets: Vec<f64>,
}

impl MetricDesc {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            subsystem: String::new(),
            name: name.into(),
            help: help.into(),
            const_labels: BTreeMap::new(),
            label_names: Vec::new(),
            buckets: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn const_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.const_labels = labels;
        self
    }

    pub fn labels(mut self, names: &[&str]) -> Self {
        self.label_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn buckets(mut self, buckets: Vec<f64>) -> Self {
        self.buckets = buckets;
        self
    }

    /// `namespace_subsystem_name`, skipping empty parts.
    pub fn fq_name(&self) -> String {
        [&self.namespace, &self.subsystem, &self.name]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Identity of a registered family. Families sharing a name but with
    /// different constant label values are distinct.
    pub(crate) fn key(&self) -> String {
        let mut key = self.fq_name();
        for (name, value) in &self.const_labels {
            key.push('|');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Distribution,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Distribution => "distribution",
        }
    }
}

/// Reject a get-or-create whose request does not match what is already
/// registered under the same key.
pub(crate) fn ensure_compatible(
    existing: &MetricDesc,
    existing_kind: MetricKind,
    requested: &MetricDesc,
    requested_kind: MetricKind,
) -> Result<()> {
    if existing_kind == requested_kind
        && existing.label_names == requested.label_names
        && existing.help == requested.help
    {
        return Ok(());
    }
    Err(MeterError::DescriptorConflict {
        name: requested.fq_name(),
        existing_kind: existing_kind.as_str(),
        existing_labels: existing.label_names.clone(),
        requested_kind: requested_kind.as_str(),
        requested_labels: requested.label_names.clone(),
    })
}

pub trait CounterMetric: Send + Sync {
    fn inc(&self, label_values: &[&str]);
}

pub trait DistributionMetric: Send + Sync {
    fn observe(&self, label_values: &[&str], value: f64);
}

/// Idempotent get-or-create of labelled metric families.
///
/// Asking twice for an identical description returns the same family.
/// Asking for a different kind, label schema or help text under an existing
/// name is a configuration error.
pub trait MetricsRegistry: Send + Sync {
    fn counter(&self, desc: &MetricDesc) -> Result<Arc<dyn CounterMetric>>;

    fn distribution(&self, desc: &MetricDesc) -> Result<Arc<dyn DistributionMetric>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fq_name_skips_empty_parts() {
        let desc = MetricDesc::new("requests_total", "help");
        assert_eq!(desc.fq_name(), "requests_total");
        assert_eq!(desc.clone().subsystem("http").fq_name(), "http_requests_total");
        assert_eq!(
            desc.namespace("shop").subsystem("http").fq_name(),
            "shop_http_requests_total"
        );
    }

    #[test]
    fn test_key_includes_const_labels() {
        let base = MetricDesc::new("x", "help");
        let mut labels = BTreeMap::new();
        labels.insert("route".to_string(), "/a".to_string());
        let with_route = base.clone().const_labels(labels);
        assert_ne!(base.key(), with_route.key());
        assert_eq!(with_route.key(), "x|route=/a");
    }

    #[test]
    fn test_ensure_compatible() {
        let a = MetricDesc::new("x", "help").labels(&["route"]);
        let b = MetricDesc::new("x", "help").labels(&["method"]);
        assert!(ensure_compatible(&a, MetricKind::Counter, &a, MetricKind::Counter).is_ok());
        assert!(ensure_compatible(&a, MetricKind::Counter, &b, MetricKind::Counter).is_err());
        assert!(ensure_compatible(&a, MetricKind::Counter, &a, MetricKind::Distribution).is_err());

        let other_help = MetricDesc::new("x", "different").labels(&["route"]);
        assert!(ensure_compatible(&a, MetricKind::Counter, &other_help, MetricKind::Counter).is_err());
    }
}
