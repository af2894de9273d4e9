use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{CounterMetric, DistributionMetric, MetricDesc, MetricKind, MetricsRegistry, ensure_compatible};
use crate::error::Result;

/// One `inc` (value 1) or `observe` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<String>,
    pub value: f64,
}

#[derive(Debug)]
pub struct MockMetric {
    desc: MetricDesc,
    kind: MetricKind,
    samples: Mutex<Vec<Sample>>,
}

impl MockMetric {
    fn record(&self, label_values: &[&str], value: f64) {
        if label_values.len() != self.desc.label_names.len() {
            tracing::warn!(
                name = %self.desc.fq_name(),
                values = ?label_values,
                "mock: dropping sample with wrong label count"
            );
            return;
        }
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Sample {
                labels: label_values.iter().map(|v| v.to_string()).collect(),
                value,
            });
    }

    pub fn desc(&self) -> &MetricDesc {
        &self.desc
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CounterMetric for MockMetric {
    fn inc(&self, label_values: &[&str]) {
        self.record(label_values, 1.0);
    }
}

impl DistributionMetric for MockMetric {
    fn observe(&self, label_values: &[&str], value: f64) {
        self.record(label_values, value);
    }
}

/// Registry that keeps every sample in memory, for tests.
#[derive(Debug, Default)]
pub struct MockRegistry {
    metrics: Mutex<HashMap<String, Arc<MockMetric>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, desc: &MetricDesc, kind: MetricKind) -> Result<Arc<MockMetric>> {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = metrics.get(&desc.key()) {
            ensure_compatible(&existing.desc, existing.kind, desc, kind)?;
            return Ok(existing.clone());
        }

        let metric = Arc::new(MockMetric {
            desc: desc.clone(),
            kind,
            samples: Mutex::new(Vec::new()),
        });
        metrics.insert(desc.key(), metric.clone());
        Ok(metric)
    }

    /// Number of distinct families created so far.
    pub fn family_count(&self) -> usize {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// All families registered under `fq_name`, whatever their const labels.
    pub fn families(&self, fq_name: &str) -> Vec<Arc<MockMetric>> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|m| m.desc.fq_name() == fq_name)
            .cloned()
            .collect()
    }

    /// Samples recorded under `fq_name` with exactly these label values.
    pub fn observations(&self, fq_name: &str, label_values: &[&str]) -> Vec<f64> {
        self.families(fq_name)
            .iter()
            .flat_map(|m| m.samples())
            .filter(|s| s.labels.iter().map(String::as_str).eq(label_values.iter().copied()))
            .map(|s| s.value)
            .collect()
    }

    /// Sum of increments under `fq_name` with these label values.
    pub fn counter_value(&self, fq_name: &str, label_values: &[&str]) -> f64 {
        self.observations(fq_name, label_values).iter().sum()
    }
}

impl MetricsRegistry for MockRegistry {
    fn counter(&self, desc: &MetricDesc) -> Result<Arc<dyn CounterMetric>> {
        Ok(self.get_or_create(desc, MetricKind::Counter)?)
    }

    fn distribution(&self, desc: &MetricDesc) -> Result<Arc<dyn DistributionMetric>> {
        Ok(self.get_or_create(desc, MetricKind::Distribution)?)
    }
}
