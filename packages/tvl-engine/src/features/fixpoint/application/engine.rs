/*
 * Fixed-Point Engine
 *
 * Worklist iteration over the analysis graph (Kildall-style), with
 * relational join at every location.
 *
 * Algorithm:
 * 1. init: number the graph (DFS post-order), decide which locations
 *    persist their structures, reset all run state
 * 2. join the (blurred) initial structures into the entry location
 * 3. while the worklist is not empty:
 *    a. pop the location with the best post-order key
 *    b. drain its unprocessed structures
 *    c. for each outgoing action, in declaration order, and each drained
 *       structure: run the transformer pipeline
 *    d. join every successor into the action's target; a non-empty delta
 *       re-enqueues the target and bumps the live-structure count
 *    e. stop as soon as the live-structure ceiling is reached
 * 4. optionally re-check every message formula on the final structures
 *
 * Worklist order: a BTreeSet keyed by post-order (negated for the default
 * reverse post-order), so each location is queued at most once.
 *
 * References:
 * - Kildall, G. (1973). "A Unified Approach to Global Program Optimization"
 * - Sagiv, Reps, Wilhelm (2002). "Parametric Shape Analysis via 3-Valued Logic"
 */

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, error, info};

use super::pipeline::TransformerPipeline;
use crate::config::{ConfigError, EngineConfig, WorklistOrder};
use crate::errors::{EngineError, Result};
use crate::features::fixpoint::domain::{
    AnalysisOutcome, AnalysisStatus, ApplyOutcome, MessageMap, Phase, RunContext,
};
use crate::features::fixpoint::infrastructure::TransitionRelation;
use crate::features::structure::ports::StructureOps;
use crate::features::transition_system::domain::{AnalysisGraph, LocationId};
use crate::features::transition_system::ports::ActionOps;

pub struct FixpointEngine<S: StructureOps, A: ActionOps<S>> {
    graph: AnalysisGraph<S, A>,
    config: EngineConfig,
    pipeline: TransformerPipeline,
    context: RunContext,

    /// (order key, location)
    worklist: BTreeSet<(i64, LocationId)>,

    relation: Option<TransitionRelation<S>>,
    initialized: bool,
}

impl<S: StructureOps, A: ActionOps<S>> FixpointEngine<S, A> {
    /// Engine over a fully built graph
    pub fn new(graph: AnalysisGraph<S, A>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        if graph.is_backward() != config.backward_analysis {
            return Err(ConfigError::conflict(
                "backward_analysis",
                "Build the graph with AnalysisGraph::with_backward using the same setting",
            )
            .into());
        }
        let pipeline = TransformerPipeline::from_config(&config)?;
        let context = RunContext::new(config.verbose);
        Ok(Self {
            graph,
            config,
            pipeline,
            context,
            worklist: BTreeSet::new(),
            relation: None,
            initialized: false,
        })
    }

    /// Initialise every action, prepare the graph and reset all per-run state
    pub fn init(&mut self) -> Result<()> {
        self.graph
            .init(self.config.save_locations, self.config.remove_skip_chains)?;
        self.graph.reset();
        self.context = RunContext::new(self.config.verbose);
        self.worklist.clear();
        self.relation = self.config.transition_relation.then(TransitionRelation::new);
        self.initialized = true;
        debug!(
            locations = self.graph.location_count(),
            actions = self.graph.edge_count(),
            "engine initialized"
        );
        Ok(())
    }

    /// Run to a fixed point, truncation, halt or refinement request
    pub fn evaluate(&mut self, initial: impl IntoIterator<Item = S>) -> Result<AnalysisOutcome<S>> {
        if !self.initialized {
            self.init()?;
        }
        // a second run starts from scratch
        self.initialized = false;

        let started = Instant::now();
        let outcome = self.run(initial);
        self.context.status.record(Phase::Total, started.elapsed());
        let outcome = outcome?;

        match &outcome {
            AnalysisOutcome::Completed => {
                info!(
                    structures = self.context.status.number_of_structures,
                    messages = self.context.status.number_of_messages,
                    "fixed point reached"
                );
                if self.config.check_messages_at_fixpoint {
                    self.evaluate_messages_at_fixpoint()?;
                }
            }
            AnalysisOutcome::Truncated { pending_locations } => {
                info!(
                    pending_locations,
                    max_structures = self.config.max_structures,
                    "analysis truncated"
                );
            }
            AnalysisOutcome::Halted(signal) => info!(%signal, "analysis halted"),
            AnalysisOutcome::Imprecise(signal) => info!(
                action = %signal.action,
                location = %signal.location,
                assignment = %signal.assignment,
                "refinement requested"
            ),
        }
        Ok(outcome)
    }

    fn run(&mut self, initial: impl IntoIterator<Item = S>) -> Result<AnalysisOutcome<S>> {
        let entry = self.graph.entry().ok_or(EngineError::NoEntryLocation)?;
        let blur = self.pipeline.order().blur;

        for mut structure in initial {
            if blur {
                structure.blur();
            }
            if let Some(delta) = self.graph.location_mut(entry).join(structure) {
                self.context.status.number_of_structures += 1;
                if let Some(relation) = &mut self.relation {
                    relation.add_state(entry, delta);
                }
            }
        }
        self.enqueue(entry);

        while let Some((_, current)) = self.worklist.pop_first() {
            self.context.status.record_iteration(self.worklist.len() + 1);
            let visit_started = Instant::now();

            let label = self.graph.location(current).label().to_string();
            let structures = self.graph.location_mut(current).remove_unprocessed();
            let edges = self.graph.location(current).edges().to_vec();
            debug!(location = %label, structures = structures.len(), "processing location");

            for edge in edges {
                let target = self.graph.edge(edge).target;
                for structure in &structures {
                    let action = self.graph.action(edge);
                    let outcome = self
                        .pipeline
                        .apply(action, structure, &label, &mut self.context);

                    let result = match outcome {
                        ApplyOutcome::Continue(result) => result,
                        ApplyOutcome::Halt(signal) => return Ok(AnalysisOutcome::Halted(signal)),
                        ApplyOutcome::Imprecise(signal) => {
                            return Ok(AnalysisOutcome::Imprecise(signal))
                        }
                        ApplyOutcome::Abort(err) => {
                            if matches!(err, EngineError::ConstraintBreach { .. }) {
                                error!(%err, "analysis stopped");
                                self.pipeline
                                    .replay(action, structure, &label, &mut self.context);
                            }
                            return Err(err);
                        }
                    };

                    if result.has_messages() {
                        self.pipeline
                            .replay(action, structure, &label, &mut self.context);
                        let title = action.title().to_string();
                        let mut messages = result.messages;
                        for (blurred, texts) in result.post_messages {
                            messages.entry(blurred).or_default().extend(texts);
                        }
                        self.record_messages(current, structure, &title, messages);
                    }
                    if result.property_failed {
                        self.graph.location_mut(current).mark_property_failed();
                    }

                    let title = self.graph.action(edge).title().to_string();
                    for successor in result.successors {
                        let started = Instant::now();
                        let recorded = self.relation.is_some().then(|| successor.clone());
                        let delta = self.graph.location_mut(target).join(successor);
                        self.context.status.record(Phase::Join, started.elapsed());

                        if let (Some(relation), Some(successor)) = (&mut self.relation, recorded) {
                            relation.add_transition(
                                (current, structure.clone()),
                                &title,
                                (target, successor),
                            );
                        }

                        if delta.is_none() {
                            continue;
                        }
                        self.enqueue(target);
                        self.context.status.number_of_structures += 1;

                        let count = self.context.status.number_of_structures;
                        if self.config.dump_every > 0 && count % self.config.dump_every == 0 {
                            info!(
                                structures = count,
                                iterations = self.context.status.iterations,
                                worklist = self.worklist.len(),
                                "progress"
                            );
                        }
                        if self.config.max_structures > 0 && count >= self.config.max_structures {
                            self.graph
                                .location_mut(current)
                                .add_time(visit_started.elapsed());
                            return Ok(AnalysisOutcome::Truncated {
                                pending_locations: self.worklist.len(),
                            });
                        }
                    }
                }
            }

            self.graph
                .location_mut(current)
                .add_time(visit_started.elapsed());
        }

        Ok(AnalysisOutcome::Completed)
    }

    fn record_messages(
        &mut self,
        location: LocationId,
        source: &S,
        action: &str,
        messages: MessageMap<S>,
    ) {
        if let Some(relation) = &mut self.relation {
            let texts: BTreeSet<String> = messages.values().flatten().cloned().collect();
            relation.add_messages(location, source.clone(), texts);
        }
        let added = self.graph.location_mut(location).add_messages(messages);
        self.context.status.number_of_messages += added;
        if added > 0 {
            debug!(
                location = self.graph.location(location).label(),
                action, added, "messages reported"
            );
        }
    }

    fn enqueue(&mut self, location: LocationId) {
        let post_order = self.graph.location(location).post_order();
        let key = match self.config.worklist_order {
            WorklistOrder::ReversePostOrder => -post_order,
            WorklistOrder::PostOrder => post_order,
        };
        self.worklist.insert((key, location));
    }

    /// Replace collected messages with those of the final structures
    ///
    /// Every action with messages is re-applied to every structure stored
    /// at its source location; only the messages are kept.
    pub fn evaluate_messages_at_fixpoint(&mut self) -> Result<()> {
        let mut ctx = RunContext::new(false);
        let mut total = 0;
        let ids: Vec<LocationId> = self.graph.locations().map(|(id, _)| id).collect();

        for id in ids {
            self.graph.location_mut(id).clear_messages();
            let label = self.graph.location(id).label().to_string();
            let structures: Vec<S> = self.graph.location(id).structures().cloned().collect();
            let edges = self.graph.location(id).edges().to_vec();

            for edge in edges {
                let action = self.graph.action(edge);
                if !action.has_messages() && !action.has_post_messages() {
                    continue;
                }
                let mut found = Vec::new();
                for structure in &structures {
                    let result = match self.pipeline.apply(action, structure, &label, &mut ctx) {
                        ApplyOutcome::Continue(result) => result,
                        ApplyOutcome::Abort(err) => return Err(err),
                        ApplyOutcome::Halt(_) | ApplyOutcome::Imprecise(_) => continue,
                    };
                    let mut messages = result.messages;
                    for (blurred, texts) in result.post_messages {
                        messages.entry(blurred).or_default().extend(texts);
                    }
                    found.push(messages);
                }
                for messages in found {
                    total += self.graph.location_mut(id).add_messages(messages);
                }
            }
        }

        self.context.status.number_of_messages = total;
        debug!(messages = total, "messages re-evaluated at fixed point");
        Ok(())
    }

    /// Final statistics report
    pub fn log_statistics(&self) {
        let status = &self.context.status;
        info!(
            iterations = status.iterations,
            max_worklist = status.max_worklist_size,
            average_worklist = status.average_worklist_size(),
            locations = self.graph.location_count(),
            actions = self.graph.edge_count(),
            structures = status.number_of_structures,
            messages = status.number_of_messages,
            constraint_breaches = status.constraint_breaches,
            "analysis statistics"
        );
        for phase in Phase::ALL {
            info!(
                phase = phase.as_str(),
                millis = status.elapsed(phase).as_millis() as u64,
                "phase time"
            );
        }
        info!(
            samples = status.focus_samples,
            mean = status.focus_discard_mean,
            variance = status.focus_discard_variance(),
            "focus discard ratio"
        );
        for (_, location) in self.graph.locations() {
            if !location.is_reachable() {
                continue;
            }
            info!(
                location = location.label(),
                structures = location.structure_count(),
                messages = location.message_count(),
                property_failed = location.property_failed(),
                millis = location.total_time().as_millis() as u64,
                "location"
            );
        }
    }

    pub fn status(&self) -> &AnalysisStatus {
        &self.context.status
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &AnalysisGraph<S, A> {
        &self.graph
    }

    /// Locations still queued (non-empty after truncation)
    pub fn pending_locations(&self) -> Vec<LocationId> {
        self.worklist.iter().map(|(_, id)| *id).collect()
    }

    pub fn transition_relation(&self) -> Option<&TransitionRelation<S>> {
        self.relation.as_ref()
    }

    pub fn transition_relation_mut(&mut self) -> Option<&mut TransitionRelation<S>> {
        self.relation.as_mut()
    }

    /// Hand the graph back for inspection or a rebuilt engine
    pub fn into_graph(self) -> AnalysisGraph<S, A> {
        self.graph
    }
}
