/*
 * Transformer Pipeline
 *
 * Applies one action to one structure at one location:
 *
 *   focus -> coerce -> precondition -> (halt) -> messages -> update
 *         -> coerce -> post messages (on a blurred copy) -> blur
 *
 * Each optional step follows the action-order flags. Failure handling:
 * - coerce failure: candidate dropped, breach counted (strict mode turns a
 *   post-update failure into Abort(ConstraintBreach))
 * - focus non-termination, semantic errors: Abort
 * - halt condition under any assignment: Halt, before any update
 * - possible precondition match with refinement on: Imprecise
 *
 * Pre-update and post-update messages are independent passes: the first
 * is keyed by the focused structure, the second by the blurred result.
 */

use std::fmt::Debug;
use std::time::Instant;

use tracing::{info, trace};

use crate::config::{ActionOrder, EngineConfig};
use crate::errors::{EngineError, Result};
use crate::features::fixpoint::domain::{
    ApplyOutcome, ApplyResult, HaltSignal, ImprecisionSignal, Phase, RunContext,
};
use crate::features::structure::domain::Assignment;
use crate::features::structure::ports::StructureOps;
use crate::features::transition_system::ports::ActionOps;

#[derive(Debug, Clone)]
pub struct TransformerPipeline {
    order: ActionOrder,

    /// Skip the update for assignments that produced a message
    freeze_structures_with_messages: bool,

    /// Post-update coerce failure aborts the run
    break_if_coerce_after_update_failed: bool,

    /// Possible precondition matches raise an imprecision signal
    refine_on_unknown_precondition: bool,

    focus_limit: usize,
}

impl Default for TransformerPipeline {
    fn default() -> Self {
        Self::new(ActionOrder::default())
    }
}

impl TransformerPipeline {
    pub fn new(order: ActionOrder) -> Self {
        Self {
            order,
            freeze_structures_with_messages: false,
            break_if_coerce_after_update_failed: false,
            refine_on_unknown_precondition: false,
            focus_limit: 10_000,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            order: config.action_order()?,
            freeze_structures_with_messages: config.freeze_structures_with_messages,
            break_if_coerce_after_update_failed: config.break_if_coerce_after_update_failed,
            refine_on_unknown_precondition: config.refine_on_unknown_precondition,
            focus_limit: config.focus_limit,
        })
    }

    pub fn with_freeze(mut self, freeze: bool) -> Self {
        self.freeze_structures_with_messages = freeze;
        self
    }

    pub fn with_strict_coerce(mut self, strict: bool) -> Self {
        self.break_if_coerce_after_update_failed = strict;
        self
    }

    pub fn with_refinement(mut self, refine: bool) -> Self {
        self.refine_on_unknown_precondition = refine;
        self
    }

    pub fn with_focus_limit(mut self, limit: usize) -> Self {
        self.focus_limit = limit;
        self
    }

    pub fn order(&self) -> ActionOrder {
        self.order
    }

    /// Successors and messages of `action` applied to `structure`
    pub fn apply<S, A>(
        &self,
        action: &A,
        structure: &S,
        location: &str,
        ctx: &mut RunContext,
    ) -> ApplyOutcome<S>
    where
        S: StructureOps,
        A: ActionOps<S> + ?Sized,
    {
        match self.run(action, structure, location, ctx) {
            Ok(outcome) => outcome,
            Err(err) => ApplyOutcome::Abort(err.while_evaluating(action.title(), location)),
        }
    }

    /// Re-run `apply` with verbose dumps; results and counters are discarded
    pub fn replay<S, A>(&self, action: &A, structure: &S, location: &str, ctx: &mut RunContext)
    where
        S: StructureOps,
        A: ActionOps<S> + ?Sized,
    {
        let saved_status = ctx.status.clone();
        let saved_verbose = ctx.verbose;
        ctx.verbose = true;
        info!(action = action.title(), location, "replaying action");
        let _ = self.apply(action, structure, location, ctx);
        ctx.verbose = saved_verbose;
        ctx.status = saved_status;
    }

    fn run<S, A>(
        &self,
        action: &A,
        structure: &S,
        location: &str,
        ctx: &mut RunContext,
    ) -> Result<ApplyOutcome<S>>
    where
        S: StructureOps,
        A: ActionOps<S> + ?Sized,
    {
        let title = action.title();
        dump(ctx, "executing", title, location, structure);

        let focused = if self.order.focus && action.has_focus() {
            let started = Instant::now();
            let focused = action.focus(structure, self.focus_limit);
            ctx.status.record(Phase::Focus, started.elapsed());
            match focused {
                Ok(focused) => focused,
                Err(err) => return Ok(ApplyOutcome::Abort(err.into_engine_error(title, location))),
            }
        } else {
            vec![structure.clone()]
        };
        let focused_count = focused.len();

        let mut result = ApplyResult::default();
        for mut candidate in focused {
            if self.order.focus && action.has_focus() {
                dump(ctx, "after focus", title, location, &candidate);
            }

            if self.order.coerce_after_focus {
                let started = Instant::now();
                let valid = candidate.coerce();
                ctx.status.record(Phase::Coerce, started.elapsed());
                if !valid {
                    ctx.status.constraint_breaches += 1;
                    continue;
                }
                dump(ctx, "after coerce", title, location, &candidate);
            }

            let started = Instant::now();
            let assignments = action.check_precondition(&candidate);
            ctx.status.record(Phase::Precondition, started.elapsed());
            let assignments = assignments?;

            for assignment in &assignments {
                if action.check_halt_condition(&candidate, assignment)? {
                    return Ok(ApplyOutcome::Halt(HaltSignal {
                        action: title.to_string(),
                        location: location.to_string(),
                    }));
                }
            }

            for assignment in assignments {
                if self.refine_on_unknown_precondition && !assignment.is_definite() {
                    return Ok(ApplyOutcome::Imprecise(Box::new(ImprecisionSignal {
                        location: location.to_string(),
                        action: title.to_string(),
                        structure: candidate,
                        assignment,
                    })));
                }

                if action.has_messages() {
                    let report = action.report_messages(&candidate, &assignment)?;
                    result.property_failed |= report.property_failed;
                    if !report.is_empty() {
                        result
                            .messages
                            .entry(candidate.clone())
                            .or_default()
                            .extend(report.texts);
                        if self.freeze_structures_with_messages {
                            continue;
                        }
                    }
                }

                if ctx.verbose {
                    info!(action = title, location, %assignment, "precondition binding");
                }

                let started = Instant::now();
                let next = action.evaluate(&candidate, &assignment);
                ctx.status.record(Phase::Update, started.elapsed());
                let mut next = next?;
                dump(ctx, "after update", title, location, &next);

                if self.order.coerce_after_update {
                    let started = Instant::now();
                    let valid = next.coerce();
                    ctx.status.record(Phase::Coerce, started.elapsed());
                    if !valid {
                        ctx.status.constraint_breaches += 1;
                        if self.break_if_coerce_after_update_failed {
                            ctx.status.coerce_after_update_failed = true;
                            return Ok(ApplyOutcome::Abort(EngineError::ConstraintBreach {
                                action: title.to_string(),
                                location: location.to_string(),
                            }));
                        }
                        continue;
                    }
                    dump(ctx, "after coerce", title, location, &next);
                }

                if action.has_post_messages() {
                    let mut blurred = next.clone();
                    if self.order.blur {
                        blurred.blur();
                    }
                    let report = action.report_post_messages(&blurred, &Assignment::new())?;
                    result.property_failed |= report.property_failed;
                    if !report.is_empty() {
                        result
                            .post_messages
                            .entry(blurred)
                            .or_default()
                            .extend(report.texts);
                    }
                }

                if self.order.blur {
                    let started = Instant::now();
                    next.blur();
                    ctx.status.record(Phase::Blur, started.elapsed());
                    dump(ctx, "after blur", title, location, &next);
                }

                if !result.successors.contains(&next) {
                    result.successors.push(next);
                }
            }
        }

        ctx.status.record_focus(focused_count, result.successors.len());
        Ok(ApplyOutcome::Continue(result))
    }
}

fn dump<S: Debug>(ctx: &RunContext, step: &str, action: &str, location: &str, structure: &S) {
    if ctx.verbose {
        info!(step, action, location, ?structure, "structure");
    } else {
        trace!(step, action, location, ?structure, "structure");
    }
}
