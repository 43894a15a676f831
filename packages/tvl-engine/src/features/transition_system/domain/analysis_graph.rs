/*
 * Analysis Graph
 *
 * The program CFG: locations are nodes, actions label the edges.
 *
 * init() prepares a graph for a fixed-point run:
 * 0. every edge's action is initialised, reachable or not; a malformed
 *    action fails the whole init with its definition error
 * 1. optional skip-chain removal (edges into an unreported location whose
 *    only way out is a skip action are redirected past it)
 * 2. DFS from the entry location (petgraph depth_first_search):
 *    pre-order and post-order numbers, incoming edges from reachable
 *    locations, back-edge targets
 * 3. unreachable locations are reported as warnings
 * 4. the save policy decides which locations persist their structures
 *
 * In backward mode every edge is reversed as it is added.
 */

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, DfsEvent};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::location::{EdgeId, Location, LocationId};
use crate::config::SaveLocations;
use crate::errors::{EngineError, Result};
use crate::features::structure::ports::StructureOps;
use crate::features::transition_system::ports::ActionOps;

/// CFG edge
#[derive(Debug)]
pub struct Edge<A> {
    pub action: A,
    pub source: LocationId,
    pub target: LocationId,
}

#[derive(Debug)]
pub struct AnalysisGraph<S: StructureOps, A> {
    locations: Vec<Location<S>>,
    edges: Vec<Edge<A>>,
    labels: FxHashMap<String, LocationId>,
    entry: Option<LocationId>,
    backward: bool,
}

impl<S: StructureOps, A> Default for AnalysisGraph<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StructureOps, A> AnalysisGraph<S, A> {
    pub fn new() -> Self {
        Self {
            locations: Vec::new(),
            edges: Vec::new(),
            labels: FxHashMap::default(),
            entry: None,
            backward: false,
        }
    }

    /// Graph whose edges are reversed on insertion
    pub fn with_backward(mut self, backward: bool) -> Self {
        self.backward = backward;
        self
    }

    pub fn is_backward(&self) -> bool {
        self.backward
    }

    /// Location for `label`, created on first use
    pub fn add_location(&mut self, label: &str) -> LocationId {
        if let Some(id) = self.labels.get(label) {
            return *id;
        }
        let id = LocationId(self.locations.len());
        self.locations.push(Location::new(label));
        self.labels.insert(label.to_string(), id);
        id
    }

    /// Add the edge `source --action--> target`
    pub fn add_action(&mut self, source: &str, action: A, target: &str) -> EdgeId {
        let (from, to) = if self.backward {
            (target, source)
        } else {
            (source, target)
        };
        let source = self.add_location(from);
        let target = self.add_location(to);

        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            action,
            source,
            target,
        });
        self.locations[source.0].edges.push(id);
        id
    }

    /// Defaults to the first location added
    pub fn set_entry(&mut self, label: &str) -> Result<()> {
        let id = self.lookup(label)?;
        self.entry = Some(id);
        Ok(())
    }

    pub fn entry(&self) -> Option<LocationId> {
        self.entry
            .or_else(|| (!self.locations.is_empty()).then_some(LocationId(0)))
    }

    /// Only the named locations are reported; all others become eligible
    /// for pass-through
    pub fn set_printable_locations(&mut self, labels: &[&str]) -> Result<()> {
        let printable = labels
            .iter()
            .map(|label| self.lookup(label))
            .collect::<Result<FxHashSet<LocationId>>>()?;
        for (index, location) in self.locations.iter_mut().enumerate() {
            location.set_reported(printable.contains(&LocationId(index)));
        }
        Ok(())
    }

    pub fn lookup(&self, label: &str) -> Result<LocationId> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| EngineError::UnknownLocation(label.to_string()))
    }

    pub fn location(&self, id: LocationId) -> &Location<S> {
        &self.locations[id.0]
    }

    pub fn location_mut(&mut self, id: LocationId) -> &mut Location<S> {
        &mut self.locations[id.0]
    }

    pub fn location_by_label(&self, label: &str) -> Option<&Location<S>> {
        self.labels.get(label).map(|id| &self.locations[id.0])
    }

    pub fn locations(&self) -> impl Iterator<Item = (LocationId, &Location<S>)> {
        self.locations
            .iter()
            .enumerate()
            .map(|(index, location)| (LocationId(index), location))
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn edge(&self, id: EdgeId) -> &Edge<A> {
        &self.edges[id.0]
    }

    pub fn action(&self, id: EdgeId) -> &A {
        &self.edges[id.0].action
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge<A>)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(index, edge)| (EdgeId(index), edge))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Clear every location's structures and messages
    pub fn reset(&mut self) {
        for location in &mut self.locations {
            location.clear();
        }
    }

    /// Initialise the actions, number the locations and apply the save policy
    pub fn init(&mut self, policy: SaveLocations, remove_skip_chains: bool) -> Result<()>
    where
        A: ActionOps<S>,
    {
        let entry = self.entry().ok_or(EngineError::NoEntryLocation)?;
        self.entry = Some(entry);

        for edge in &mut self.edges {
            edge.action.init()?;
        }

        if remove_skip_chains {
            let removed = self.remove_skip_chains(entry);
            debug!(removed, "skip chains removed");
        }

        self.number_locations(entry);

        let unreachable: Vec<&str> = self
            .locations
            .iter()
            .filter(|l| !l.is_reachable() && !l.skipped)
            .map(Location::label)
            .collect();
        if !unreachable.is_empty() {
            warn!(locations = ?unreachable, "unreachable locations");
        }

        for location in &mut self.locations {
            let join = policy.should_join(
                location.incoming,
                location.has_back_edge,
                location.is_reported(),
            );
            location.set_do_join(join);
        }
        Ok(())
    }

    fn number_locations(&mut self, entry: LocationId) {
        for location in &mut self.locations {
            location.reset_order();
        }

        let mut graph: DiGraph<usize, usize> = DiGraph::with_capacity(self.locations.len(), self.edges.len());
        let nodes: Vec<NodeIndex> = (0..self.locations.len()).map(|i| graph.add_node(i)).collect();
        for (index, edge) in self.edges.iter().enumerate() {
            graph.add_edge(nodes[edge.source.0], nodes[edge.target.0], index);
        }

        let locations = &mut self.locations;
        let mut pre = 0i64;
        let mut post = 0i64;
        depth_first_search(&graph, Some(nodes[entry.0]), |event| match event {
            DfsEvent::Discover(n, _) => {
                locations[n.index()].pre_order = pre;
                pre += 1;
            }
            DfsEvent::TreeEdge(_, v) | DfsEvent::CrossForwardEdge(_, v) => {
                locations[v.index()].incoming += 1;
            }
            DfsEvent::BackEdge(_, v) => {
                let target = &mut locations[v.index()];
                target.incoming += 1;
                target.has_back_edge = true;
            }
            DfsEvent::Finish(n, _) => {
                locations[n.index()].post_order = post;
                post += 1;
            }
        });
    }

    /// Redirect edges past unreported locations with a single outgoing
    /// skip action; returns the number of redirections
    fn remove_skip_chains(&mut self, entry: LocationId) -> usize
    where
        A: ActionOps<S>,
    {
        let mut removed = 0;
        // each round shortens every chain by one hop
        for _ in 0..self.locations.len() {
            let mut changed = false;
            for index in 0..self.edges.len() {
                let edge = &self.edges[index];
                let middle = edge.target;
                if middle == edge.source || middle == entry {
                    continue;
                }
                let location = &self.locations[middle.0];
                if location.is_reported() || location.edges.len() != 1 {
                    continue;
                }
                let next = &self.edges[location.edges[0].0];
                if !next.action.is_skip_action() || next.target == middle {
                    continue;
                }
                let target = next.target;

                self.edges[index].target = target;
                self.locations[middle.0].skipped = true;
                removed += 1;
                changed = true;
            }
            if !changed {
                break;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FocusError;
    use crate::features::structure::domain::Assignment;
    use crate::features::transition_system::ports::MessageReport;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Shape;

    impl StructureOps for Shape {
        fn coerce(&mut self) -> bool {
            true
        }
        fn blur(&mut self) {}
        fn node_count(&self) -> usize {
            0
        }
    }

    struct Step {
        skip: bool,
        broken: bool,
        init_calls: usize,
    }

    impl ActionOps<Shape> for Step {
        fn init(&mut self) -> Result<()> {
            self.init_calls += 1;
            if self.broken {
                return Err(EngineError::definition("step", &"x(v)", "bad update"));
            }
            Ok(())
        }
        fn title(&self) -> &str {
            "step"
        }
        fn has_focus(&self) -> bool {
            false
        }
        fn focus(&self, s: &Shape, _: usize) -> std::result::Result<Vec<Shape>, FocusError> {
            Ok(vec![s.clone()])
        }
        fn check_precondition(&self, _: &Shape) -> Result<Vec<Assignment>> {
            Ok(vec![Assignment::new()])
        }
        fn check_halt_condition(&self, _: &Shape, _: &Assignment) -> Result<bool> {
            Ok(false)
        }
        fn report_messages(&self, _: &Shape, _: &Assignment) -> Result<MessageReport> {
            Ok(MessageReport::default())
        }
        fn report_post_messages(&self, _: &Shape, _: &Assignment) -> Result<MessageReport> {
            Ok(MessageReport::default())
        }
        fn evaluate(&self, s: &Shape, _: &Assignment) -> Result<Shape> {
            Ok(s.clone())
        }
        fn has_messages(&self) -> bool {
            false
        }
        fn has_post_messages(&self) -> bool {
            false
        }
        fn is_skip_action(&self) -> bool {
            self.skip
        }
        fn is_universe_changing(&self) -> bool {
            false
        }
    }

    fn step() -> Step {
        Step { skip: false, broken: false, init_calls: 0 }
    }

    fn skip() -> Step {
        Step { skip: true, ..step() }
    }

    fn broken() -> Step {
        Step { broken: true, ..step() }
    }

    #[test]
    fn test_loop_head_gets_back_edge_and_joins() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        graph.add_action("L0", step(), "L1");
        graph.add_action("L1", step(), "L2");
        graph.add_action("L2", step(), "L1");
        graph.add_action("L1", step(), "L3");
        graph.set_printable_locations(&["L3"]).unwrap();
        graph.init(SaveLocations::JoinPoints, false).unwrap();

        let l1 = graph.location_by_label("L1").unwrap();
        assert!(l1.has_back_edge());
        assert_eq!(l1.incoming(), 2);
        assert!(l1.do_join());
        assert!(!graph.location_by_label("L2").unwrap().do_join());
        assert!(graph.location_by_label("L3").unwrap().do_join());
        assert_eq!(graph.location_by_label("L0").unwrap().pre_order(), 0);
    }

    #[test]
    fn test_post_order_places_exit_first() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        graph.add_action("a", step(), "b");
        graph.add_action("b", step(), "c");
        graph.init(SaveLocations::All, false).unwrap();

        assert_eq!(graph.location_by_label("c").unwrap().post_order(), 0);
        assert_eq!(graph.location_by_label("a").unwrap().post_order(), 2);
    }

    #[test]
    fn test_backward_reverses_edges() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new().with_backward(true);
        let edge = graph.add_action("a", step(), "b");
        assert_eq!(graph.location(graph.edge(edge).source).label(), "b");
        assert_eq!(graph.entry(), graph.lookup("b").ok());
    }

    #[test]
    fn test_unreachable_location_is_unnumbered() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        graph.add_action("a", step(), "b");
        graph.add_location("island");
        graph.init(SaveLocations::All, false).unwrap();
        assert!(!graph.location_by_label("island").unwrap().is_reachable());
    }

    #[test]
    fn test_init_reaches_every_edge() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        graph.add_action("a", step(), "b");
        graph.add_action("island", step(), "shore");
        graph.init(SaveLocations::All, false).unwrap();

        assert_eq!(graph.action(EdgeId(0)).init_calls, 1);
        assert_eq!(graph.action(EdgeId(1)).init_calls, 1);
        assert!(!graph.location_by_label("island").unwrap().is_reachable());
    }

    #[test]
    fn test_broken_action_on_unreachable_location_fails_init() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        graph.add_action("a", step(), "b");
        graph.add_action("island", broken(), "shore");
        let err = graph.init(SaveLocations::All, false).unwrap_err();
        assert!(matches!(err, EngineError::Definition { ref action, .. } if action == "step"));
    }

    #[test]
    fn test_skip_chain_redirected() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        graph.add_action("a", step(), "b");
        graph.add_action("b", skip(), "c");
        graph.add_action("c", skip(), "d");
        graph.set_printable_locations(&["a", "d"]).unwrap();
        graph.init(SaveLocations::JoinPoints, true).unwrap();

        let first = graph.edge(EdgeId(0));
        assert_eq!(graph.location(first.target).label(), "d");
        assert!(!graph.location_by_label("b").unwrap().is_reachable());
    }

    #[test]
    fn test_unknown_printable_location_rejected() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        graph.add_action("a", step(), "b");
        let err = graph.set_printable_locations(&["zz"]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownLocation(ref l) if l == "zz"));
    }

    #[test]
    fn test_empty_graph_has_no_entry() {
        let mut graph: AnalysisGraph<Shape, Step> = AnalysisGraph::new();
        assert!(matches!(
            graph.init(SaveLocations::All, false),
            Err(EngineError::NoEntryLocation)
        ));
    }
}
