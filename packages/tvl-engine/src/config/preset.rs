//! Preset configurations
//!
//! Presets provide complete default configurations for common use cases.

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// Configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Permissive defaults: breaches prune branches, no refinement signal
    Default,

    /// Verification runs
    ///
    /// - Post-update coerce failure aborts the analysis
    /// - Possible precondition matches raise an imprecision signal
    Strict,

    /// Debugging an analysis definition
    ///
    /// - Verbose per-step structure dumps
    /// - Transition relation recorded for counter-example extraction
    /// - Messages re-checked at the fixed point
    Diagnostic,
}

impl Preset {
    /// Parse preset from string
    pub fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "strict" => Ok(Self::Strict),
            "diagnostic" => Ok(Self::Diagnostic),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Strict => "strict",
            Self::Diagnostic => "diagnostic",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::Default
    }
}
