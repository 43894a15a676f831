//! Typed exits of the transformer pipeline and the fixed-point driver

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::errors::EngineError;
use crate::features::structure::domain::Assignment;

/// Messages keyed by the structure they were found on
pub type MessageMap<S> = FxHashMap<S, BTreeSet<String>>;

/// Halt condition satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltSignal {
    pub action: String,
    pub location: String,
}

impl fmt::Display for HaltSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "halt condition of action '{}' holds at location {}",
            self.action, self.location
        )
    }
}

/// Precondition matched only possibly; everything needed to reproduce it
#[derive(Debug, Clone)]
pub struct ImprecisionSignal<S> {
    pub location: String,
    pub action: String,
    pub structure: S,
    pub assignment: Assignment,
}

/// Successful application of one action to one structure
#[derive(Debug)]
pub struct ApplyResult<S> {
    /// Distinct successor structures
    pub successors: Vec<S>,

    /// Pre-update messages, keyed by the focused structure
    pub messages: MessageMap<S>,

    /// Post-update messages, keyed by the blurred result
    pub post_messages: MessageMap<S>,

    /// A definite-property message did not hold definitely
    pub property_failed: bool,
}

impl<S> Default for ApplyResult<S> {
    fn default() -> Self {
        Self {
            successors: Vec::new(),
            messages: FxHashMap::default(),
            post_messages: FxHashMap::default(),
            property_failed: false,
        }
    }
}

impl<S> ApplyResult<S> {
    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty() || !self.post_messages.is_empty()
    }
}

/// Result of `TransformerPipeline::apply`
#[derive(Debug)]
pub enum ApplyOutcome<S> {
    Continue(ApplyResult<S>),
    Halt(HaltSignal),
    Imprecise(Box<ImprecisionSignal<S>>),
    Abort(EngineError),
}

/// Non-fatal end of `FixpointEngine::evaluate`
///
/// Fatal conditions are returned as `Err(EngineError)` instead.
#[derive(Debug)]
pub enum AnalysisOutcome<S> {
    /// Worklist exhausted: every location holds its fixed point
    Completed,
    /// Live-structure ceiling reached; results are partial
    Truncated { pending_locations: usize },
    /// A halt condition held
    Halted(HaltSignal),
    /// Refinement requested on a possible precondition match
    Imprecise(Box<ImprecisionSignal<S>>),
}

impl<S> AnalysisOutcome<S> {
    pub fn is_completed(&self) -> bool {
        matches!(self, AnalysisOutcome::Completed)
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, AnalysisOutcome::Truncated { .. })
    }
}
