//! CFG location: merged structures, pending deltas, scheduling metadata

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::features::structure::infrastructure::RelationalSet;
use crate::features::structure::ports::StructureOps;

/// Index of a location in its analysis graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub usize);

/// Index of an edge (action) in its analysis graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One program point
///
/// `structures` holds everything merged so far; `unprocessed` holds the
/// deltas not yet propagated. A pass-through location (`do_join == false`)
/// hands out and forgets its whole set on every drain.
#[derive(Debug)]
pub struct Location<S: StructureOps> {
    label: String,

    /// Merged structures
    structures: RelationalSet<S>,

    /// Deltas awaiting propagation (persisting locations only)
    unprocessed: Vec<S>,

    /// Messages per structure
    messages: FxHashMap<S, BTreeSet<String>>,

    /// Outgoing edges in declaration order
    pub(crate) edges: Vec<EdgeId>,

    /// DFS numbering, -1 when unreached
    pub(crate) post_order: i64,
    pub(crate) pre_order: i64,

    /// Incoming edges from reachable locations
    pub(crate) incoming: usize,
    pub(crate) has_back_edge: bool,

    /// Collapsed by skip-chain removal
    pub(crate) skipped: bool,

    reported: bool,
    do_join: bool,
    property_failed: bool,
    total_time: Duration,
}

impl<S: StructureOps> Location<S> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            structures: RelationalSet::new(),
            unprocessed: Vec::new(),
            messages: FxHashMap::default(),
            edges: Vec::new(),
            post_order: -1,
            pre_order: -1,
            incoming: 0,
            has_back_edge: false,
            skipped: false,
            reported: true,
            do_join: true,
            property_failed: false,
            total_time: Duration::ZERO,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Merge `structure`; `None` when already subsumed
    ///
    /// The delta is queued for propagation when this location persists.
    pub fn join(&mut self, structure: S) -> Option<S> {
        let delta = self.structures.merge_with(structure)?;
        if self.do_join {
            self.unprocessed.push(delta.clone());
        }
        Some(delta)
    }

    /// Structures to propagate on this visit
    pub fn remove_unprocessed(&mut self) -> Vec<S> {
        if self.do_join {
            std::mem::take(&mut self.unprocessed)
        } else {
            self.unprocessed.clear();
            self.structures.drain()
        }
    }

    pub fn structures(&self) -> impl Iterator<Item = &S> {
        self.structures.iter()
    }

    pub fn contains(&self, structure: &S) -> bool {
        self.structures.contains(structure)
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn has_unprocessed(&self) -> bool {
        !self.unprocessed.is_empty()
    }

    /// Record messages; returns how many were new
    pub fn add_messages(&mut self, messages: FxHashMap<S, BTreeSet<String>>) -> usize {
        let mut added = 0;
        for (structure, texts) in messages {
            let entry = self.messages.entry(structure).or_default();
            for text in texts {
                if entry.insert(text) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn messages(&self) -> &FxHashMap<S, BTreeSet<String>> {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.values().map(BTreeSet::len).sum()
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Forget all run state, keep topology
    pub fn clear(&mut self) {
        self.structures.clear();
        self.unprocessed.clear();
        self.messages.clear();
        self.property_failed = false;
        self.total_time = Duration::ZERO;
    }

    pub(crate) fn reset_order(&mut self) {
        self.post_order = -1;
        self.pre_order = -1;
        self.incoming = 0;
        self.has_back_edge = false;
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn post_order(&self) -> i64 {
        self.post_order
    }

    pub fn pre_order(&self) -> i64 {
        self.pre_order
    }

    pub fn incoming(&self) -> usize {
        self.incoming
    }

    pub fn has_back_edge(&self) -> bool {
        self.has_back_edge
    }

    pub fn is_reachable(&self) -> bool {
        self.pre_order >= 0
    }

    pub fn is_reported(&self) -> bool {
        self.reported
    }

    pub fn set_reported(&mut self, reported: bool) {
        self.reported = reported;
    }

    pub fn do_join(&self) -> bool {
        self.do_join
    }

    pub(crate) fn set_do_join(&mut self, do_join: bool) {
        self.do_join = do_join;
    }

    pub fn property_failed(&self) -> bool {
        self.property_failed
    }

    pub fn mark_property_failed(&mut self) {
        self.property_failed = true;
    }

    pub fn add_time(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }
}
