//! Engine configuration
//!
//! Two tiers:
//! - Preset: `EngineConfig::preset(Preset::Strict)`
//! - YAML / field overrides: `EngineConfig::from_yaml_str(..)`
//!
//! # Examples
//!
//! ```rust,ignore
//! use tvl_engine::config::{EngineConfig, Preset};
//!
//! let config = EngineConfig::preset(Preset::Diagnostic);
//! let config = EngineConfig::from_yaml_file("analysis.yaml")?;
//! let order = config.action_order()?;
//! ```

pub mod engine_config;
pub mod error;
pub mod preset;
pub mod validation;

// Re-exports
pub use engine_config::{ActionOrder, EngineConfig, SaveLocations, WorklistOrder};
pub use error::{ConfigError, ConfigResult};
pub use preset::Preset;
pub use validation::Validatable;
