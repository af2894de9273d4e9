use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeterError {
    // Registration errors
    #[error(
        "metric {name} already registered as {existing_kind} with labels {existing_labels:?}, requested {requested_kind} with labels {requested_labels:?}"
    )]
    DescriptorConflict {
        name: String,
        existing_kind: &'static str,
        existing_labels: Vec<String>,
        requested_kind: &'static str,
        requested_labels: Vec<String>,
    },

    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    // Routing errors
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // Config errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MeterError>;

impl MeterError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
