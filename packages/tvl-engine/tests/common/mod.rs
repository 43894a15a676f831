//! Common test utilities for tvl-engine
//!
//! Fake structures and actions implementing the engine ports without any
//! three-valued semantics, plus small graph builders.

#![allow(dead_code)]

use std::cell::Cell;

use tvl_engine::errors::{FocusError, Result};
use tvl_engine::features::structure::domain::Assignment;
use tvl_engine::features::structure::ports::StructureOps;
use tvl_engine::features::transition_system::ports::{ActionOps, MessageReport};
use tvl_engine::{Kleene, Node};

/// Opaque state identified by a number; `consistent` is what coerce reports
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FakeStructure {
    pub id: u32,
    pub consistent: bool,
}

impl FakeStructure {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            consistent: true,
        }
    }

    pub fn inconsistent(id: u32) -> Self {
        Self {
            id,
            consistent: false,
        }
    }
}

impl StructureOps for FakeStructure {
    fn coerce(&mut self) -> bool {
        self.consistent
    }

    fn blur(&mut self) {}

    fn node_count(&self) -> usize {
        1
    }
}

type Step = Box<dyn Fn(&FakeStructure, &Assignment) -> FakeStructure>;

/// Scriptable action
pub struct FakeAction {
    title: String,
    step: Step,
    focus_split: usize,
    focus_fails: bool,
    assignments: usize,
    possible: bool,
    halts: bool,
    message: Option<String>,
    post_message: Option<String>,
    skip: bool,
    evaluations: Cell<usize>,
}

impl FakeAction {
    pub fn new(
        title: &str,
        step: impl Fn(&FakeStructure, &Assignment) -> FakeStructure + 'static,
    ) -> Self {
        Self {
            title: title.to_string(),
            step: Box::new(step),
            focus_split: 0,
            focus_fails: false,
            assignments: 1,
            possible: false,
            halts: false,
            message: None,
            post_message: None,
            skip: false,
            evaluations: Cell::new(0),
        }
    }

    /// Returns its input unchanged
    pub fn identity(title: &str) -> Self {
        Self::new(title, |s, _| s.clone())
    }

    /// Adds one to the structure id
    pub fn increment(title: &str) -> Self {
        Self::new(title, |s, _| FakeStructure::new(s.id + 1))
    }

    /// Every update result fails coerce
    pub fn breaking(title: &str) -> Self {
        Self::new(title, |s, _| FakeStructure::inconsistent(s.id))
    }

    /// Identity action with no parts at all
    pub fn skip(title: &str) -> Self {
        let mut action = Self::identity(title);
        action.skip = true;
        action
    }

    /// Focus splits each structure into `n` (ids `100 * id + i`)
    pub fn with_focus(mut self, n: usize) -> Self {
        self.focus_split = n;
        self
    }

    pub fn with_failing_focus(mut self) -> Self {
        self.focus_split = 1;
        self.focus_fails = true;
        self
    }

    /// Precondition yields `n` assignments binding `v`
    pub fn with_assignments(mut self, n: usize) -> Self {
        self.assignments = n;
        self
    }

    /// Assignments are only possible matches
    pub fn possible(mut self) -> Self {
        self.possible = true;
        self
    }

    pub fn halting(mut self) -> Self {
        self.halts = true;
        self
    }

    pub fn with_message(mut self, text: &str) -> Self {
        self.message = Some(text.to_string());
        self
    }

    pub fn with_post_message(mut self, text: &str) -> Self {
        self.post_message = Some(text.to_string());
        self
    }

    /// Number of `evaluate` calls so far
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }
}

impl ActionOps<FakeStructure> for FakeAction {
    fn title(&self) -> &str {
        &self.title
    }

    fn has_focus(&self) -> bool {
        self.focus_split > 0
    }

    fn focus(
        &self,
        structure: &FakeStructure,
        _limit: usize,
    ) -> std::result::Result<Vec<FakeStructure>, FocusError> {
        if self.focus_fails {
            return Err(FocusError::new("no definite partition"));
        }
        Ok((0..self.focus_split as u32)
            .map(|i| FakeStructure {
                id: structure.id * 100 + i,
                consistent: structure.consistent,
            })
            .collect())
    }

    fn check_precondition(&self, _structure: &FakeStructure) -> Result<Vec<Assignment>> {
        let kleene = if self.possible {
            Kleene::Unknown
        } else {
            Kleene::True
        };
        Ok((0..self.assignments as u32)
            .map(|i| Assignment::new().bind("v", Node(i)).with_kleene(kleene))
            .collect())
    }

    fn check_halt_condition(&self, _structure: &FakeStructure, _assignment: &Assignment) -> Result<bool> {
        Ok(self.halts)
    }

    fn report_messages(&self, _structure: &FakeStructure, _assignment: &Assignment) -> Result<MessageReport> {
        let mut report = MessageReport::default();
        report.texts.extend(self.message.clone());
        Ok(report)
    }

    fn report_post_messages(&self, _structure: &FakeStructure, _assignment: &Assignment) -> Result<MessageReport> {
        let mut report = MessageReport::default();
        report.texts.extend(self.post_message.clone());
        Ok(report)
    }

    fn evaluate(&self, structure: &FakeStructure, assignment: &Assignment) -> Result<FakeStructure> {
        self.evaluations.set(self.evaluations.get() + 1);
        Ok((self.step)(structure, assignment))
    }

    fn has_messages(&self) -> bool {
        self.message.is_some()
    }

    fn has_post_messages(&self) -> bool {
        self.post_message.is_some()
    }

    fn is_skip_action(&self) -> bool {
        self.skip
    }

    fn is_universe_changing(&self) -> bool {
        false
    }
}

pub fn structures(ids: &[u32]) -> Vec<FakeStructure> {
    ids.iter().copied().map(FakeStructure::new).collect()
}

/// Sorted ids of the structures stored at a location
pub fn ids<'a>(structures: impl Iterator<Item = &'a FakeStructure>) -> Vec<u32> {
    let mut ids: Vec<u32> = structures.map(|s| s.id).collect();
    ids.sort_unstable();
    ids
}
