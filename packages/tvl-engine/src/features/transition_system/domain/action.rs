/*
 * Action: formula-driven abstract transformer
 *
 * Parts, all optional:
 * - focus formulas
 * - precondition (searched conjunct by conjunct)
 * - halt condition
 * - predicate updates (simultaneous)
 * - pre-update and post-update messages
 * - new-node allocation (marked with a unary predicate during the update)
 * - retain formula (unary; nodes where it is 0 are removed)
 *
 * Precondition search:
 * 1. Split the precondition into top-level conjuncts (memoized)
 * 2. Pre-compute closure tables for the precondition's TC sub-formulas
 * 3. Depth-first join: conjunct k is solved under each partial result of
 *    conjunct k-1, using an explicit stack of per-depth iterators
 * 4. Project completed paths onto the precondition's free variables
 * 5. Clear the closure tables
 */

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::trace;

use crate::errors::{EngineError, FocusError, Result};
use crate::features::structure::domain::{
    Assignment, Formula, Predicate, PredicateUpdate, TransitiveFormula, Var,
};
use crate::features::structure::ports::{ClosureCache, FormulaStructure};
use crate::features::transition_system::ports::{ActionOps, MessageReport};
use crate::shared::models::Kleene;

/// Message text reported when its formula holds
///
/// Texts prefixed with `1:` (`0:`) are definite-property messages: reported
/// only when the formula is definitely 1 (0), otherwise the location is
/// marked as failing the property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMessage {
    pub formula: Formula,
    pub text: String,
}

impl ReportMessage {
    fn expected(&self) -> Option<Kleene> {
        if self.text.starts_with("1:") {
            Some(Kleene::True)
        } else if self.text.starts_with("0:") {
            Some(Kleene::False)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct PreconditionPlan {
    conjuncts: Vec<Formula>,
    closures: Vec<Arc<TransitiveFormula>>,
    free: BTreeSet<Var>,
}

#[derive(Debug)]
pub struct Action {
    title: String,
    focus: Vec<Formula>,
    precondition: Option<Formula>,
    halt: Option<Formula>,
    updates: Vec<PredicateUpdate>,
    messages: Vec<ReportMessage>,
    post_messages: Vec<ReportMessage>,
    new_marker: Option<Predicate>,
    retain: Option<Formula>,
    retain_var: Option<Var>,
    initialized: bool,
    plan: OnceCell<PreconditionPlan>,
}

impl Action {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            focus: Vec::new(),
            precondition: None,
            halt: None,
            updates: Vec::new(),
            messages: Vec::new(),
            post_messages: Vec::new(),
            new_marker: None,
            retain: None,
            retain_var: None,
            initialized: false,
            plan: OnceCell::new(),
        }
    }

    pub fn with_focus(mut self, formula: Formula) -> Self {
        self.focus.push(formula);
        self
    }

    pub fn with_precondition(mut self, formula: Formula) -> Self {
        self.precondition = Some(formula);
        self
    }

    pub fn with_halt(mut self, formula: Formula) -> Self {
        self.halt = Some(formula);
        self
    }

    pub fn with_update(mut self, update: PredicateUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn with_message(mut self, formula: Formula, text: impl Into<String>) -> Self {
        self.messages.push(ReportMessage {
            formula,
            text: text.into(),
        });
        self
    }

    pub fn with_post_message(mut self, formula: Formula, text: impl Into<String>) -> Self {
        self.post_messages.push(ReportMessage {
            formula,
            text: text.into(),
        });
        self
    }

    /// Allocate one node per application, marked with `marker` (unary)
    /// while the updates are evaluated
    pub fn with_new(mut self, marker: &Predicate) -> Self {
        self.new_marker = Some(marker.clone());
        self
    }

    /// Keep only nodes where the unary `formula` is not 0
    pub fn with_retain(mut self, formula: Formula) -> Self {
        self.retain = Some(formula);
        self
    }

    pub fn precondition(&self) -> Option<&Formula> {
        self.precondition.as_ref()
    }

    pub fn updates(&self) -> &[PredicateUpdate] {
        &self.updates
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Validate formulas; idempotent
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let precondition_free = self
            .precondition
            .as_ref()
            .map(Formula::free_vars)
            .unwrap_or_default();

        for formula in self.all_formulas() {
            if let Some((predicate, count)) = formula.arity_mismatch() {
                return Err(self.definition_error(
                    formula,
                    format!(
                        "predicate {predicate} expects {} arguments, got {count}",
                        predicate.arity()
                    ),
                ));
            }
        }

        if let Some(marker) = &self.new_marker {
            if marker.arity() != 1 {
                return Err(self.definition_error(marker, "new-node marker must be unary"));
            }
        }

        for update in &self.updates {
            self.check_update(update, &precondition_free)?;
        }

        for message in &self.messages {
            let extra = minus(&message.formula.free_vars(), &precondition_free);
            if !extra.is_empty() {
                return Err(self.definition_error(
                    &message.formula,
                    format!("message has superfluous free variables {}", var_list(&extra)),
                ));
            }
        }
        for message in &self.post_messages {
            let free = message.formula.free_vars();
            if !free.is_empty() {
                return Err(self.definition_error(
                    &message.formula,
                    format!("post message must be closed but has {}", var_list(&free)),
                ));
            }
        }

        if let Some(halt) = &self.halt {
            let extra = minus(&halt.free_vars(), &precondition_free);
            if !extra.is_empty() {
                return Err(self.definition_error(
                    halt,
                    format!("halt condition has superfluous free variables {}", var_list(&extra)),
                ));
            }
        }

        if let Some(retain) = &self.retain {
            let vars = minus(&retain.free_vars(), &precondition_free);
            if vars.len() != 1 {
                return Err(self.definition_error(retain, "retain formula must be unary"));
            }
            self.retain_var = vars.into_iter().next();
        }

        self.initialized = true;
        Ok(())
    }

    fn check_update(&self, update: &PredicateUpdate, precondition_free: &BTreeSet<Var>) -> Result<()> {
        if update.args.len() != update.predicate.arity() {
            return Err(self.definition_error(
                update,
                format!(
                    "predicate {} expects {} arguments",
                    update.predicate,
                    update.predicate.arity()
                ),
            ));
        }

        let args: BTreeSet<Var> = update.args.iter().cloned().collect();
        if args.len() != update.args.len() {
            return Err(self.definition_error(update, "left-hand side repeats a variable"));
        }
        if let Some(clash) = update.args.iter().find(|v| precondition_free.contains(*v)) {
            return Err(self.definition_error(
                update,
                format!("variable {clash} clashes with a variable of the same name in the precondition"),
            ));
        }

        let extra = minus(&minus(&update.formula.free_vars(), precondition_free), &args);
        if !extra.is_empty() {
            let reason = if update.args.is_empty() {
                format!("nullary update should be closed but has {}", var_list(&extra))
            } else {
                format!("update has superfluous free variables {}", var_list(&extra))
            };
            return Err(self.definition_error(update, reason));
        }
        Ok(())
    }

    fn definition_error(&self, formula: &impl fmt::Display, reason: impl Into<String>) -> EngineError {
        EngineError::definition(self.title.clone(), formula, reason)
    }

    fn all_formulas(&self) -> impl Iterator<Item = &Formula> {
        self.focus
            .iter()
            .chain(self.precondition.iter())
            .chain(self.halt.iter())
            .chain(self.updates.iter().map(|u| &u.formula))
            .chain(self.messages.iter().map(|m| &m.formula))
            .chain(self.post_messages.iter().map(|m| &m.formula))
            .chain(self.retain.iter())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::semantic(format!(
                "action {} used before initialization",
                self.title
            )))
        }
    }

    fn plan(&self, precondition: &Formula) -> &PreconditionPlan {
        self.plan.get_or_init(|| PreconditionPlan {
            conjuncts: precondition.conjuncts(),
            closures: precondition.closures(),
            free: precondition.free_vars(),
        })
    }

    /// Iterative depth-first join over the conjuncts
    fn search<S: FormulaStructure>(
        &self,
        structure: &S,
        plan: &PreconditionPlan,
        closures: &ClosureCache,
    ) -> Result<Vec<Assignment>> {
        let depth = plan.conjuncts.len();
        let mut found: BTreeMap<Assignment, Kleene> = BTreeMap::new();
        let first = structure.eval_formula(&plan.conjuncts[0], &Assignment::new(), closures)?;
        let mut stack = vec![first.into_iter()];

        while let Some(top) = stack.last_mut() {
            let Some(partial) = top.next() else {
                stack.pop();
                continue;
            };
            if stack.len() == depth {
                let projected = partial.project(&plan.free);
                let kleene = partial.kleene();
                found
                    .entry(projected)
                    .and_modify(|k| *k = k.or(kleene))
                    .or_insert(kleene);
            } else {
                let next = structure.eval_formula(&plan.conjuncts[stack.len()], &partial, closures)?;
                stack.push(next.into_iter());
            }
        }

        Ok(found
            .into_iter()
            .map(|(assignment, kleene)| assignment.with_kleene(kleene))
            .collect())
    }

    fn report<S: FormulaStructure>(
        &self,
        structure: &S,
        assignment: &Assignment,
        messages: &[ReportMessage],
    ) -> Result<MessageReport> {
        self.ensure_initialized()?;
        let closures = ClosureCache::new();
        let mut report = MessageReport::default();
        for message in messages {
            let value = structure.eval(&message.formula, assignment, &closures)?;
            match message.expected() {
                Some(expected) if value == expected => {
                    report.texts.insert(message.text.clone());
                }
                Some(_) => report.property_failed = true,
                None if value != Kleene::False => {
                    report.texts.insert(message.text.clone());
                }
                None => {}
            }
        }
        Ok(report)
    }
}

fn minus(left: &BTreeSet<Var>, right: &BTreeSet<Var>) -> BTreeSet<Var> {
    left.difference(right).cloned().collect()
}

fn var_list(vars: &BTreeSet<Var>) -> String {
    let names: Vec<&str> = vars.iter().map(Var::name).collect();
    format!("[{}]", names.join(", "))
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl<S: FormulaStructure> ActionOps<S> for Action {
    fn init(&mut self) -> Result<()> {
        Action::init(self)
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn has_focus(&self) -> bool {
        !self.focus.is_empty()
    }

    fn focus(&self, structure: &S, limit: usize) -> std::result::Result<Vec<S>, FocusError> {
        structure.focus(&self.focus, limit)
    }

    fn check_precondition(&self, structure: &S) -> Result<Vec<Assignment>> {
        self.ensure_initialized()?;
        let Some(precondition) = &self.precondition else {
            return Ok(vec![Assignment::new()]);
        };
        let plan = self.plan(precondition);

        let mut closures = ClosureCache::new();
        for tc in &plan.closures {
            if tc.is_closed_step() {
                closures.insert(tc.clone(), structure.closure_table(tc, &Assignment::new())?);
            }
        }
        let result = self.search(structure, plan, &closures);
        closures.clear();

        if let Ok(assignments) = &result {
            trace!(action = %self.title, matches = assignments.len(), "precondition search");
        }
        result
    }

    fn check_halt_condition(&self, structure: &S, assignment: &Assignment) -> Result<bool> {
        self.ensure_initialized()?;
        match &self.halt {
            Some(halt) => Ok(structure.eval(halt, assignment, &ClosureCache::new())? == Kleene::True),
            None => Ok(false),
        }
    }

    fn report_messages(&self, structure: &S, assignment: &Assignment) -> Result<MessageReport> {
        self.report(structure, assignment, &self.messages)
    }

    fn report_post_messages(&self, structure: &S, assignment: &Assignment) -> Result<MessageReport> {
        self.report(structure, assignment, &self.post_messages)
    }

    fn evaluate(&self, structure: &S, assignment: &Assignment) -> Result<S> {
        self.ensure_initialized()?;
        let mut base = structure.clone();
        if let Some(marker) = &self.new_marker {
            let node = base.allocate_node();
            base.set_value(marker, &[node], Kleene::True);
        }

        let mut result = base.clone();
        result.update_predicates(&base, &self.updates, assignment)?;

        if let (Some(retain), Some(var)) = (&self.retain, &self.retain_var) {
            let closures = ClosureCache::new();
            for node in base.nodes() {
                let bound = assignment.clone().bind(var.clone(), node);
                if base.eval(retain, &bound, &closures)? == Kleene::False {
                    result.remove_node(node);
                }
            }
        }

        if let Some(marker) = &self.new_marker {
            result.clear_predicate(marker);
        }
        Ok(result)
    }

    fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    fn has_post_messages(&self) -> bool {
        !self.post_messages.is_empty()
    }

    fn is_skip_action(&self) -> bool {
        self.focus.is_empty()
            && self.precondition.is_none()
            && self.halt.is_none()
            && self.updates.is_empty()
            && self.messages.is_empty()
            && self.post_messages.is_empty()
            && self.new_marker.is_none()
            && self.retain.is_none()
    }

    fn is_universe_changing(&self) -> bool {
        self.new_marker.is_some() || self.retain.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::structure::domain::Vocabulary;
    use crate::features::structure::infrastructure::Tvs;
    use crate::shared::models::Node;

    struct Fixture {
        tvs: Tvs,
        x: Predicate,
        n: Predicate,
        marker: Predicate,
    }

    fn fixture() -> Fixture {
        let mut vocabulary = Vocabulary::new();
        let x = vocabulary.declare("x", 1, true).unwrap();
        let n = vocabulary.declare("n", 2, false).unwrap();
        let marker = vocabulary.declare("isNew", 1, false).unwrap();
        let tvs = Tvs::new(Arc::new(vocabulary));
        Fixture { tvs, x, n, marker }
    }

    #[test]
    fn test_init_rejects_clashing_update_variable() {
        let f = fixture();
        let mut action = Action::new("bad")
            .with_precondition(Formula::atom(&f.x, &["v"]))
            .with_update(PredicateUpdate::new(&f.x, &["v"], Formula::atom(&f.x, &["v"])));
        let err = action.init().unwrap_err();
        assert!(matches!(err, EngineError::Definition { action, .. } if action == "bad"));
    }

    #[test]
    fn test_init_rejects_superfluous_update_variable() {
        let f = fixture();
        let mut action = Action::new("bad")
            .with_update(PredicateUpdate::new(&f.x, &["v"], Formula::atom(&f.n, &["v", "w"])));
        let err = action.init().unwrap_err();
        assert!(err.to_string().contains("superfluous"));
    }

    #[test]
    fn test_init_accepts_precondition_variables_in_update() {
        let f = fixture();
        let mut action = Action::new("ok")
            .with_precondition(Formula::atom(&f.x, &["w"]))
            .with_update(PredicateUpdate::new(&f.x, &["v"], Formula::atom(&f.n, &["w", "v"])));
        assert!(action.init().is_ok());
    }

    #[test]
    fn test_uninitialized_action_refuses_to_run() {
        let f = fixture();
        let action = Action::new("raw");
        assert!(ActionOps::<Tvs>::check_precondition(&action, &f.tvs).is_err());
    }

    #[test]
    fn test_no_precondition_yields_empty_assignment() {
        let f = fixture();
        let mut action = Action::new("skip");
        action.init().unwrap();
        let result = action.check_precondition(&f.tvs).unwrap();
        assert_eq!(result, vec![Assignment::new()]);
        assert!(ActionOps::<Tvs>::is_skip_action(&action));
    }

    #[test]
    fn test_precondition_with_closure_uses_cache() {
        let mut f = fixture();
        let a = f.tvs.add_node();
        let b = f.tvs.add_node();
        let c = f.tvs.add_node();
        f.tvs.set(&f.x, &[a], Kleene::True);
        f.tvs.set(&f.n, &[a, b], Kleene::True);
        f.tvs.set(&f.n, &[b, c], Kleene::True);

        // x(l) & TC(l, r)(s, t). n(s, t)
        let mut action = Action::new("reach").with_precondition(Formula::and(
            Formula::atom(&f.x, &["l"]),
            Formula::closure("l", "r", "s", "t", Formula::atom(&f.n, &["s", "t"])),
        ));
        action.init().unwrap();
        let result = action.check_precondition(&f.tvs).unwrap();
        let targets: Vec<Node> = result
            .iter()
            .filter_map(|a| a.get(&Var::new("r")))
            .collect();
        assert_eq!(targets, vec![b, c]);
        assert!(result.iter().all(Assignment::is_definite));
    }

    #[test]
    fn test_possible_match_is_not_definite() {
        let mut f = fixture();
        let a = f.tvs.add_node();
        f.tvs.set(&f.x, &[a], Kleene::Unknown);
        let mut action = Action::new("maybe").with_precondition(Formula::atom(&f.x, &["v"]));
        action.init().unwrap();
        let result = action.check_precondition(&f.tvs).unwrap();
        assert_eq!(result.len(), 1);
        assert!(!result[0].is_definite());
    }

    #[test]
    fn test_evaluate_new_and_retain() {
        let mut f = fixture();
        let a = f.tvs.add_node();
        f.tvs.set(&f.x, &[a], Kleene::True);

        // allocate a node and point x at it; drop everything not in x
        let mut action = Action::new("x = malloc()")
            .with_new(&f.marker)
            .with_update(PredicateUpdate::new(&f.x, &["v"], Formula::atom(&f.marker, &["v"])))
            .with_retain(Formula::atom(&f.marker, &["v"]));
        action.init().unwrap();
        assert!(ActionOps::<Tvs>::is_universe_changing(&action));

        let result = action.evaluate(&f.tvs, &Assignment::new()).unwrap();
        assert_eq!(result.node_set().len(), 1);
        let only = *result.node_set().iter().next().unwrap();
        assert_ne!(only, a);
        assert_eq!(result.get(&f.x, &[only]), Kleene::True);
        assert_eq!(result.tuples(&f.marker).count(), 0);
    }

    #[test]
    fn test_definite_message_marks_property_failure() {
        let mut f = fixture();
        let a = f.tvs.add_node();
        f.tvs.set(&f.x, &[a], Kleene::Unknown);
        let mut action = Action::new("check")
            .with_message(Formula::exists("v", Formula::atom(&f.x, &["v"])), "1:x is set")
            .with_message(Formula::exists("v", Formula::atom(&f.x, &["v"])), "x may be set");
        action.init().unwrap();

        let report = action.report_messages(&f.tvs, &Assignment::new()).unwrap();
        assert!(report.property_failed);
        assert_eq!(report.texts.len(), 1);
        assert!(report.texts.contains("x may be set"));
    }
}
