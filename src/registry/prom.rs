use once_cell::sync::Lazy;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use super::{CounterMetric, DistributionMetric, MetricDesc, MetricKind, MetricsRegistry, ensure_compatible};
use crate::error::{MeterError, Result};

static GLOBAL: Lazy<Arc<PrometheusRegistry>> =
    Lazy::new(|| Arc::new(PrometheusRegistry::with_registry(prometheus::default_registry().clone())));

#[derive(Clone)]
enum Family {
    Counter(CounterVec),
    Histogram(HistogramVec),
}

struct Entry {
    desc: MetricDesc,
    family: Family,
}

impl Entry {
    fn kind(&self) -> MetricKind {
        match self.family {
            Family::Counter(_) => MetricKind::Counter,
            Family::Histogram(_) => MetricKind::Distribution,
        }
    }
}

/// [`MetricsRegistry`] on top of a `prometheus::Registry`.
///
/// Counters map to `CounterVec`. The prometheus crate has no summary type,
/// so distributions are `HistogramVec`s with the buckets from the
/// description.
pub struct PrometheusRegistry {
    registry: Registry,
    families: Mutex<HashMap<String, Entry>>,
}

impl PrometheusRegistry {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            families: Mutex::new(HashMap::new()),
        }
    }

    /// Shared instance over the process-wide default registry.
    pub fn global() -> Arc<PrometheusRegistry> {
        GLOBAL.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render everything in the registry in the Prometheus text format.
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MeterError::Config(format!("non-UTF-8 exposition: {e}")))
    }

    fn get_or_create(&self, desc: &MetricDesc, kind: MetricKind) -> Result<Family> {
        let mut families = self.families.lock().unwrap_or_else(PoisonError::into_inner);
        let key = desc.key();

        if let Some(entry) = families.get(&key) {
            ensure_compatible(&entry.desc, entry.kind(), desc, kind)?;
            return Ok(entry.family.clone());
        }

        let labels: Vec<&str> = desc.label_names.iter().map(String::as_str).collect();
        let const_labels = to_hash_map(&desc.const_labels);
        let family = match kind {
            MetricKind::Counter => {
                let opts = Opts::new(desc.name.clone(), desc.help.clone())
                    .namespace(desc.namespace.clone())
                    .subsystem(desc.subsystem.clone())
                    .const_labels(const_labels);
                let vec = CounterVec::new(opts, &labels)?;
                self.registry.register(Box::new(vec.clone()))?;
                Family::Counter(vec)
            }
            MetricKind::Distribution => {
                let opts = HistogramOpts::new(desc.name.clone(), desc.help.clone())
                    .namespace(desc.namespace.clone())
                    .subsystem(desc.subsystem.clone())
                    .const_labels(const_labels)
                    .buckets(desc.buckets.clone());
                let vec = HistogramVec::new(opts, &labels)?;
                self.registry.register(Box::new(vec.clone()))?;
                Family::Histogram(vec)
            }
        };

        tracing::debug!(
            name = %desc.fq_name(),
            kind = kind.as_str(),
            labels = ?desc.label_names,
            "registered metric family"
        );

        families.insert(
            key,
            Entry {
                desc: desc.clone(),
                family: family.clone(),
            },
        );
        Ok(family)
    }
}

impl Default for PrometheusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry for PrometheusRegistry {
    fn counter(&self, desc: &MetricDesc) -> Result<Arc<dyn CounterMetric>> {
        match self.get_or_create(desc, MetricKind::Counter)? {
            Family::Counter(vec) => Ok(Arc::new(vec)),
            Family::Histogram(_) => Err(MeterError::Config(format!(
                "{} resolved to a histogram",
                desc.fq_name()
            ))),
        }
    }

    fn distribution(&self, desc: &MetricDesc) -> Result<Arc<dyn DistributionMetric>> {
        match self.get_or_create(desc, MetricKind::Distribution)? {
            Family::Histogram(vec) => Ok(Arc::new(vec)),
            Family::Counter(_) => Err(MeterError::Config(format!(
                "{} resolved to a counter",
                desc.fq_name()
            ))),
        }
    }
}

impl CounterMetric for CounterVec {
    fn inc(&self, label_values: &[&str]) {
        match self.get_metric_with_label_values(label_values) {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::warn!(error = %e, values = ?label_values, "dropping counter increment"),
        }
    }
}

impl DistributionMetric for HistogramVec {
    fn observe(&self, label_values: &[&str], value: f64) {
        match self.get_metric_with_label_values(label_values) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => tracing::warn!(error = %e, values = ?label_values, "dropping observation"),
        }
    }
}

fn to_hash_map(labels: &BTreeMap<String, String>) -> HashMap<String, String> {
    labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
