/*
 * Transition Relation
 *
 * Records every (location, structure) --action--> (location, structure)
 * step the engine actually performs, as a petgraph DiGraph.
 *
 * Queries:
 * - error_trace: shortest path (A*, unit cost, zero heuristic) from the
 *   first recorded state to any state carrying a message
 * - prune_from_messages: keep only states that can reach a message,
 *   found by DFS on the reversed graph
 *
 * Recording is observation only; the fixed point never reads it.
 */

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::features::structure::ports::StructureOps;
use crate::features::transition_system::domain::LocationId;

/// Vertex of the relation
pub type AbstractState<S> = (LocationId, S);

/// One step of a counter-example trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep<S> {
    pub location: LocationId,
    pub structure: S,
    /// Action that led here; `None` for the first step
    pub action: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransitionRelation<S: StructureOps> {
    graph: DiGraph<AbstractState<S>, String>,
    index: FxHashMap<AbstractState<S>, NodeIndex>,
    messages: FxHashMap<NodeIndex, BTreeSet<String>>,
    entry: Option<AbstractState<S>>,
}

impl<S: StructureOps> Default for TransitionRelation<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StructureOps> TransitionRelation<S> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: FxHashMap::default(),
            messages: FxHashMap::default(),
            entry: None,
        }
    }

    /// Vertex for `(location, structure)`; the first one added is the entry
    pub fn add_state(&mut self, location: LocationId, structure: S) -> NodeIndex {
        let key = (location, structure);
        if let Some(node) = self.index.get(&key) {
            return *node;
        }
        if self.entry.is_none() {
            self.entry = Some(key.clone());
        }
        let node = self.graph.add_node(key.clone());
        self.index.insert(key, node);
        node
    }

    /// Edge labelled `action`; parallel edges with the same label collapse
    pub fn add_transition(
        &mut self,
        from: AbstractState<S>,
        action: &str,
        to: AbstractState<S>,
    ) {
        let source = self.add_state(from.0, from.1);
        let target = self.add_state(to.0, to.1);
        let exists = self
            .graph
            .edges_connecting(source, target)
            .any(|edge| edge.weight() == action);
        if !exists {
            self.graph.add_edge(source, target, action.to_string());
        }
    }

    pub fn add_messages(
        &mut self,
        location: LocationId,
        structure: S,
        texts: impl IntoIterator<Item = String>,
    ) {
        let node = self.add_state(location, structure);
        self.messages.entry(node).or_default().extend(texts);
    }

    pub fn messages_of(&self, location: LocationId, structure: &S) -> Option<&BTreeSet<String>> {
        let node = self.index.get(&(location, structure.clone()))?;
        self.messages.get(node)
    }

    pub fn state_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn transition_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn message_state_count(&self) -> usize {
        self.messages.len()
    }

    /// Shortest path from the entry state to a message-bearing state
    ///
    /// Empty when no message state is reachable.
    pub fn error_trace(&self) -> Vec<TraceStep<S>> {
        let Some(entry) = self.entry.as_ref().and_then(|key| self.index.get(key)) else {
            return Vec::new();
        };
        let found = astar(
            &self.graph,
            *entry,
            |node| self.messages.contains_key(&node),
            |_| 1usize,
            |_| 0usize,
        );
        let Some((_, path)) = found else {
            return Vec::new();
        };

        let mut trace = Vec::with_capacity(path.len());
        let mut previous: Option<NodeIndex> = None;
        for node in path {
            let (location, structure) = &self.graph[node];
            let action = previous
                .and_then(|from| self.graph.find_edge(from, node))
                .map(|edge| self.graph[edge].clone());
            trace.push(TraceStep {
                location: *location,
                structure: structure.clone(),
                action,
            });
            previous = Some(node);
        }
        trace
    }

    /// Drop every state from which no message-bearing state is reachable
    pub fn prune_from_messages(&mut self) {
        let reversed = Reversed(&self.graph);
        let mut keep: FxHashSet<NodeIndex> = FxHashSet::default();
        let mut dfs = Dfs::empty(reversed);
        for start in self.messages.keys() {
            dfs.move_to(*start);
            while let Some(node) = dfs.next(reversed) {
                keep.insert(node);
            }
        }

        let messages: FxHashMap<AbstractState<S>, BTreeSet<String>> = self
            .messages
            .drain()
            .map(|(node, texts)| (self.graph[node].clone(), texts))
            .collect();

        let graph = self.graph.filter_map(
            |node, state| keep.contains(&node).then(|| state.clone()),
            |_, action| Some(action.clone()),
        );

        self.index = graph
            .node_indices()
            .map(|node| (graph[node].clone(), node))
            .collect();
        self.messages = messages
            .into_iter()
            .filter_map(|(key, texts)| self.index.get(&key).map(|node| (*node, texts)))
            .collect();
        self.graph = graph;
    }

    /// States grouped by location
    pub fn states_at(&self) -> BTreeMap<LocationId, Vec<&S>> {
        let mut grouped: BTreeMap<LocationId, Vec<&S>> = BTreeMap::new();
        for (location, structure) in self.graph.node_weights() {
            grouped.entry(*location).or_default().push(structure);
        }
        grouped
    }
}
