use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub instrument: InstrumentOpts,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Naming and shape of the four per-route metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentOpts {
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_subsystem")]
    pub subsystem: String,
    /// Labels stamped on every descriptor created with these options
    #[serde(default)]
    pub const_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub route_label: RouteLabelMode,
    /// Bucket bounds for the request duration distribution, in microseconds
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,
    /// Bucket bounds for the request and response size distributions, in bytes
    #[serde(default = "default_size_buckets")]
    pub size_buckets: Vec<f64>,
}

impl Default for InstrumentOpts {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            subsystem: default_subsystem(),
            const_labels: BTreeMap::new(),
            route_label: RouteLabelMode::default(),
            duration_buckets: default_duration_buckets(),
            size_buckets: default_size_buckets(),
        }
    }
}

impl InstrumentOpts {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn with_const_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.insert(name.into(), value.into());
        self
    }

    pub fn with_route_label(mut self, mode: RouteLabelMode) -> Self {
        self.route_label = mode;
        self
    }
}

fn default_subsystem() -> String { "http".to_string() }

// 100us .. ~26s, factor 4
fn default_duration_buckets() -> Vec<f64> {
    exponential(100.0, 4.0, 10)
}

// 64B .. 16MiB, factor 4
fn default_size_buckets() -> Vec<f64> {
    exponential(64.0, 4.0, 10)
}

fn exponential(start: f64, factor: f64, count: usize) -> Vec<f64> {
    std::iter::successors(Some(start), |b| Some(b * factor))
        .take(count)
        .collect()
}

/// Where the route template ends up in the metric schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteLabelMode {
    /// `route` is a variable label on every metric
    #[default]
    Dimension,
    /// `route` is merged into the constant labels of each descriptor
    ConstLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_format() -> LogFormat { LogFormat::Json }
fn default_log_level() -> String { "info".to_string() }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }
}
