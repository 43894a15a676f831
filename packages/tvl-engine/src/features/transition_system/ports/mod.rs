//! Action port consumed by the transformer pipeline

use std::collections::BTreeSet;

use crate::errors::{FocusError, Result};
use crate::features::structure::domain::Assignment;
use crate::features::structure::ports::StructureOps;

/// Messages matched by one evaluation of an action's message formulas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageReport {
    pub texts: BTreeSet<String>,
    /// A definite-property message (`1:` / `0:`) did not hold definitely
    pub property_failed: bool,
}

impl MessageReport {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Abstract transformer attached to one CFG edge
///
/// Implementations are immutable once initialised; every other method takes `&self`.
pub trait ActionOps<S: StructureOps> {
    /// Validate and prepare the action before any structure reaches it.
    /// Called once per edge by the analysis graph, must be idempotent.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn title(&self) -> &str;

    /// Whether the action declares focus formulas
    fn has_focus(&self) -> bool;

    /// Split `structure` so every focus formula is definite
    fn focus(&self, structure: &S, limit: usize) -> std::result::Result<Vec<S>, FocusError>;

    /// All maximal assignments under which the precondition is not false
    fn check_precondition(&self, structure: &S) -> Result<Vec<Assignment>>;

    fn check_halt_condition(&self, structure: &S, assignment: &Assignment) -> Result<bool>;

    /// Pre-update messages for one assignment
    fn report_messages(&self, structure: &S, assignment: &Assignment) -> Result<MessageReport>;

    /// Post-update messages, evaluated on a blurred result
    fn report_post_messages(&self, structure: &S, assignment: &Assignment)
        -> Result<MessageReport>;

    /// Apply the update to a private copy
    fn evaluate(&self, structure: &S, assignment: &Assignment) -> Result<S>;

    fn has_messages(&self) -> bool;

    fn has_post_messages(&self) -> bool;

    /// No focus, precondition, update, messages or universe change
    fn is_skip_action(&self) -> bool;

    /// Allocates or removes nodes
    fn is_universe_changing(&self) -> bool;
}
