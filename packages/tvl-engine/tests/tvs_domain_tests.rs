//! End-to-end runs over three-valued structures: a singly linked list
//! built by repeated push-front

use std::sync::Arc;

use tvl_engine::config::EngineConfig;
use tvl_engine::features::structure::domain::{Formula, Predicate, PredicateUpdate, Vocabulary};
use tvl_engine::features::structure::Tvs;
use tvl_engine::features::transition_system::{Action, AnalysisGraph};
use tvl_engine::{EngineError, FixpointEngine, Kleene};

struct ListVocabulary {
    vocabulary: Arc<Vocabulary>,
    x: Predicate,
    n: Predicate,
    is_new: Predicate,
}

fn list_vocabulary() -> ListVocabulary {
    let mut vocabulary = Vocabulary::new();
    let x = vocabulary.declare("x", 1, true).unwrap();
    let n = vocabulary.declare("n", 2, false).unwrap();
    let is_new = vocabulary.declare("isNew", 1, false).unwrap();
    ListVocabulary {
        vocabulary: Arc::new(vocabulary),
        x,
        n,
        is_new,
    }
}

/// `t = malloc(); t.n = x; x = t`
fn push(v: &ListVocabulary) -> Action {
    Action::new("push")
        .with_new(&v.is_new)
        .with_update(PredicateUpdate::new(&v.x, &["v"], Formula::atom(&v.is_new, &["v"])))
        .with_update(PredicateUpdate::new(
            &v.n,
            &["v1", "v2"],
            Formula::or(
                Formula::atom(&v.n, &["v1", "v2"]),
                Formula::and(
                    Formula::atom(&v.is_new, &["v1"]),
                    Formula::atom(&v.x, &["v2"]),
                ),
            ),
        ))
}

fn list_graph(v: &ListVocabulary) -> AnalysisGraph<Tvs, Action> {
    let mut graph = AnalysisGraph::new();
    graph.add_action("L0", push(v), "L0");
    graph.add_action("L0", Action::new("skip"), "L1");
    graph
}

#[test]
fn test_push_loop_converges_with_bounded_structures() {
    let v = list_vocabulary();
    let mut engine = FixpointEngine::new(list_graph(&v), EngineConfig::default()).unwrap();
    let outcome = engine.evaluate(vec![Tvs::new(v.vocabulary.clone())]).unwrap();
    assert!(outcome.is_completed());

    let exit = engine.graph().location_by_label("L1").unwrap();
    // empty list, one cell, two cells, and at least one summarized tail
    assert!(exit.structure_count() >= 3);
    for structure in exit.structures() {
        // one unary abstraction predicate: at most two canonical names
        assert!(structure.node_set().len() <= 2);
        assert_eq!(structure.tuples(&v.is_new).count(), 0);
    }
    assert!(exit
        .structures()
        .any(|s| s.node_set().iter().any(|node| s.is_summary(*node))));
}

#[test]
fn test_head_is_always_definite_after_push() {
    let v = list_vocabulary();
    let mut engine = FixpointEngine::new(list_graph(&v), EngineConfig::default()).unwrap();
    engine.evaluate(vec![Tvs::new(v.vocabulary.clone())]).unwrap();

    let exit = engine.graph().location_by_label("L1").unwrap();
    for structure in exit.structures().filter(|s| !s.node_set().is_empty()) {
        let heads: Vec<Kleene> = structure
            .node_set()
            .iter()
            .map(|node| structure.get(&v.x, &[*node]))
            .filter(|value| *value != Kleene::False)
            .collect();
        assert_eq!(heads, vec![Kleene::True]);
    }
}

#[test]
fn test_null_head_message() {
    let v = list_vocabulary();
    let mut graph = list_graph(&v);
    let check = Action::new("assert x != null").with_message(
        Formula::negate(Formula::exists("v", Formula::atom(&v.x, &["v"]))),
        "x may be null",
    );
    graph.add_action("L1", check, "L2");

    let mut engine = FixpointEngine::new(graph, EngineConfig::default()).unwrap();
    engine.evaluate(vec![Tvs::new(v.vocabulary.clone())]).unwrap();

    let exit = engine.graph().location_by_label("L1").unwrap();
    // only the empty list triggers the message
    assert_eq!(exit.message_count(), 1);
    let (structure, texts) = exit.messages().iter().next().unwrap();
    assert!(structure.node_set().is_empty());
    assert!(texts.contains("x may be null"));
}

/// Update variable `v` clashes with the precondition's free `v`
fn self_binding(v: &ListVocabulary) -> Action {
    Action::new("bad")
        .with_precondition(Formula::atom(&v.x, &["v"]))
        .with_update(PredicateUpdate::new(&v.x, &["v"], Formula::atom(&v.x, &["v"])))
}

#[test]
fn test_engine_initializes_actions_before_running() {
    let v = list_vocabulary();
    let graph = list_graph(&v);
    assert!(graph.edges().all(|(_, edge)| !edge.action.is_initialized()));

    let mut engine = FixpointEngine::new(graph, EngineConfig::default()).unwrap();
    engine.init().unwrap();
    assert!(engine
        .graph()
        .edges()
        .all(|(_, edge)| edge.action.is_initialized()));
}

#[test]
fn test_malformed_action_on_island_fails_init() {
    let v = list_vocabulary();
    let mut graph: AnalysisGraph<Tvs, Action> = AnalysisGraph::new();
    graph.add_action("L0", Action::new("ok"), "L1");
    graph.add_action("L5", self_binding(&v), "L6");

    let mut engine = FixpointEngine::new(graph, EngineConfig::default()).unwrap();
    let err = engine.init().unwrap_err();
    assert!(matches!(err, EngineError::Definition { ref action, .. } if action == "bad"));
}

#[test]
fn test_malformed_action_fails_evaluate_before_any_structure() {
    let v = list_vocabulary();
    let mut graph = list_graph(&v);
    graph.add_action("L1", self_binding(&v), "L2");

    let mut engine = FixpointEngine::new(graph, EngineConfig::default()).unwrap();
    let err = engine
        .evaluate(vec![Tvs::new(v.vocabulary.clone())])
        .unwrap_err();
    assert!(matches!(err, EngineError::Definition { ref action, .. } if action == "bad"));
    assert_eq!(engine.graph().location_by_label("L1").unwrap().structure_count(), 0);
}
