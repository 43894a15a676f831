//! Error types for tvl-engine
//!
//! Fatal conditions only. Halting, truncation and imprecision are reported
//! through `AnalysisOutcome`, and consistency breaches never leave the
//! transformer pipeline unless strict mode escalates them.

use std::fmt::Display;

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed action, detected by `Action::init`
    #[error("Definition error in action '{action}': {reason} in formula {formula}")]
    Definition {
        action: String,
        formula: String,
        reason: String,
    },

    /// Focus could not reach a finite definite partition
    #[error("Focus did not terminate while evaluating action '{action}' at location {location}: {reason}")]
    FocusNonTermination {
        action: String,
        location: String,
        reason: String,
    },

    /// Coerce failed after an update in strict mode
    #[error("Coerce failed after update of action '{action}' at location {location}")]
    ConstraintBreach { action: String, location: String },

    /// Ill-formed formula met during evaluation
    #[error("Semantic error: {reason}{context}")]
    Semantic { reason: String, context: String },

    /// Label not present in the analysis graph
    #[error("Unknown program location {0}")]
    UnknownLocation(String),

    /// Graph has no locations
    #[error("The analysis graph has no entry location")]
    NoEntryLocation,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Create a definition error naming the offending formula
    pub fn definition(
        action: impl Into<String>,
        formula: &impl Display,
        reason: impl Into<String>,
    ) -> Self {
        EngineError::Definition {
            action: action.into(),
            formula: formula.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a semantic error without context
    pub fn semantic(reason: impl Into<String>) -> Self {
        EngineError::Semantic {
            reason: reason.into(),
            context: String::new(),
        }
    }

    /// Attach the action and location being evaluated
    ///
    /// Only semantic errors carry free-form context; other variants
    /// already name what they need.
    pub fn while_evaluating(self, action: &str, location: &str) -> Self {
        match self {
            EngineError::Semantic { reason, context } if context.is_empty() => {
                EngineError::Semantic {
                    reason,
                    context: format!(" while evaluating the action {action} at location {location}"),
                }
            }
            other => other,
        }
    }
}

/// Failure of the structure layer's focus operation
///
/// The pipeline turns this into `EngineError::FocusNonTermination` once it
/// knows the action and location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct FocusError {
    pub reason: String,
}

impl FocusError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Attach context
    pub fn into_engine_error(self, action: &str, location: &str) -> EngineError {
        EngineError::FocusNonTermination {
            action: action.to_string(),
            location: location.to_string(),
            reason: self.reason,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
