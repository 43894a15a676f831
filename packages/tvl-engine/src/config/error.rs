//! Configuration error types

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Range validation error
    #[error("Invalid range for field '{field}': {value} not in {min}..={max}. {hint}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        hint: String,
    },

    /// Malformed transformer order string
    #[error("Invalid action order '{order}'. {hint}")]
    InvalidActionOrder { order: String, hint: String },

    /// Setting that disagrees with an already-built object
    #[error("Conflicting setting '{field}'. {hint}")]
    Conflict { field: String, hint: String },

    /// Unknown preset name
    #[error("Unknown preset '{0}'. Valid presets: default, strict, diagnostic")]
    UnknownPreset(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create a range error with a hint
    pub fn range_with_hint(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
        hint: impl Into<String>,
    ) -> Self {
        Self::Range {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            hint: hint.into(),
        }
    }

    pub fn invalid_action_order(order: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidActionOrder {
            order: order.into(),
            hint: hint.into(),
        }
    }

    pub fn conflict(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
            hint: hint.into(),
        }
    }
}
