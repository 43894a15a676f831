/*
 * Coerce
 *
 * Fixed point over the structure's constraints. For every assignment of a
 * constraint's free variables where the body is definitely true:
 * - head 1: nothing to do
 * - head 0: the structure has no concretization, coerce fails
 * - head 1/2: sharpen the head literal so it becomes 1
 *
 * Sharpening can enable other constraints, so the pass repeats until no
 * value changes.
 */

use std::sync::Arc;

use tracing::{error, trace};

use super::tvs::{tuples_of, Tvs};
use crate::features::structure::domain::{Assignment, Constraint, Formula, Var};
use crate::features::structure::ports::{ClosureCache, FormulaStructure};
use crate::shared::models::Kleene;

pub(super) fn coerce(tvs: &mut Tvs) -> bool {
    let constraints = Arc::clone(&tvs.constraints);
    if constraints.is_empty() {
        return true;
    }
    let closures = ClosureCache::new();

    loop {
        let mut changed = false;
        for constraint in constraints.iter() {
            match apply_constraint(tvs, constraint, &closures) {
                Some(sharpened) => changed |= sharpened,
                None => return false,
            }
        }
        if !changed {
            return true;
        }
    }
}

/// One pass of one constraint; `None` on a breach
fn apply_constraint(tvs: &mut Tvs, constraint: &Constraint, closures: &ClosureCache) -> Option<bool> {
    let mut vars = constraint.body().free_vars();
    vars.extend(constraint.head().free_vars());
    let vars: Vec<Var> = vars.into_iter().collect();
    let nodes = tvs.nodes();
    let mut changed = false;

    for tuple in tuples_of(&nodes, vars.len()) {
        let mut assignment = Assignment::new();
        for (var, node) in vars.iter().zip(&tuple) {
            assignment.put(var.clone(), *node);
        }

        let evaluated = tvs
            .eval(constraint.body(), &assignment, closures)
            .and_then(|body| Ok((body, tvs.eval(constraint.head(), &assignment, closures)?)));
        let (body, head) = match evaluated {
            Ok(values) => values,
            Err(err) => {
                error!(%constraint, %err, "constraint cannot be evaluated");
                return None;
            }
        };

        if body != Kleene::True {
            continue;
        }
        match head {
            Kleene::True => {}
            Kleene::False => {
                trace!(%constraint, %assignment, "constraint breached");
                return None;
            }
            Kleene::Unknown => changed |= sharpen(tvs, constraint.head(), &assignment),
        }
    }
    Some(changed)
}

/// Make an indefinite head literal true; returns whether a value changed
fn sharpen(tvs: &mut Tvs, head: &Formula, assignment: &Assignment) -> bool {
    let (literal, value) = match head {
        Formula::Not(inner) => (inner.as_ref(), Kleene::False),
        other => (other, Kleene::True),
    };
    match literal {
        Formula::Atom { predicate, args } => {
            let tuple: Option<Vec<_>> = args.iter().map(|v| assignment.get(v)).collect();
            match tuple {
                Some(tuple) => {
                    tvs.set(predicate, &tuple, value);
                    true
                }
                None => false,
            }
        }
        Formula::Equal(a, b) if value == Kleene::True => {
            match (assignment.get(a), assignment.get(b)) {
                (Some(left), Some(right)) if left == right && tvs.is_summary(left) => {
                    tvs.set_summary(left, false);
                    true
                }
                _ => false,
            }
        }
        _ => false,
    }
}
