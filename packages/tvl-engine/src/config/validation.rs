//! Configuration validation

use super::error::ConfigResult;

/// Trait for validatable configuration objects
///
/// # Example
/// ```rust,ignore
/// use tvl_engine::config::Validatable;
///
/// fn build_engine<C: Validatable>(config: C) -> Result<(), ConfigError> {
///     config.validate()?;
///     // ... build engine
/// }
/// ```
pub trait Validatable {
    /// Validate the configuration
    ///
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;

    /// Get the configuration name for error messages
    fn config_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
