/*
 * Focus
 *
 * Repeatedly picks an assignment under which a focus formula is 1/2,
 * walks the formula down to the indefinite literal responsible, and
 * splits the structure on it:
 * - atom on non-summary nodes: two structures (0 and 1)
 * - unary atom on a summary node: three structures (all 0, all 1, and
 *   a materialized copy holding the 1 part)
 * - anything else (binary atom on a summary node, equality on a summary
 *   node, transitive closure, literal 1/2): not focusable
 *
 * The split is repeated until every focus formula is definite under every
 * assignment or the structure count exceeds the limit.
 */

use tracing::trace;

use super::tvs::Tvs;
use crate::errors::{EngineError, FocusError};
use crate::features::structure::domain::{Assignment, Formula, Predicate};
use crate::features::structure::ports::{ClosureCache, FormulaStructure};
use crate::shared::models::{Kleene, Node};

/// Indefinite literal to split on
#[derive(Debug)]
enum Target {
    Atom(Predicate, Vec<Node>),
}

pub(super) fn focus(tvs: &Tvs, formulas: &[Formula], limit: usize) -> Result<Vec<Tvs>, FocusError> {
    let closures = ClosureCache::new();
    let mut work = vec![tvs.clone()];
    let mut done: Vec<Tvs> = Vec::new();
    let mut produced = 1usize;

    while let Some(current) = work.pop() {
        match find_indefinite(&current, formulas, &closures)? {
            None => {
                if !done.contains(&current) {
                    done.push(current);
                }
            }
            Some(target) => {
                trace!(?target, "focus split");
                let splits = split(&current, target)?;
                produced += splits.len();
                if produced > limit {
                    return Err(FocusError::new(format!(
                        "focus produced more than {limit} structures"
                    )));
                }
                work.extend(splits);
            }
        }
    }

    Ok(done)
}

fn semantic(err: EngineError) -> FocusError {
    FocusError::new(err.to_string())
}

fn find_indefinite(
    tvs: &Tvs,
    formulas: &[Formula],
    closures: &ClosureCache,
) -> Result<Option<Target>, FocusError> {
    for formula in formulas {
        let matches = tvs
            .eval_formula(formula, &Assignment::new(), closures)
            .map_err(semantic)?;
        if let Some(assignment) = matches.into_iter().find(|a| a.kleene() == Kleene::Unknown) {
            return locate(tvs, formula, assignment, closures).map(Some);
        }
    }
    Ok(None)
}

/// Descend into the sub-formula that makes `formula` 1/2 under `assignment`
fn locate(
    tvs: &Tvs,
    formula: &Formula,
    assignment: Assignment,
    closures: &ClosureCache,
) -> Result<Target, FocusError> {
    let value = |f: &Formula, a: &Assignment| tvs.eval(f, a, closures).map_err(semantic);

    match formula {
        Formula::Atom { predicate, args } => {
            let tuple = args
                .iter()
                .map(|v| {
                    assignment
                        .get(v)
                        .ok_or_else(|| FocusError::new(format!("unbound variable {v}")))
                })
                .collect::<Result<Vec<Node>, FocusError>>()?;
            Ok(Target::Atom(predicate.clone(), tuple))
        }
        Formula::Not(inner) => locate(tvs, inner, assignment, closures),
        Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) => {
            if value(a, &assignment)? == Kleene::Unknown {
                locate(tvs, a, assignment, closures)
            } else {
                locate(tvs, b, assignment, closures)
            }
        }
        Formula::Exists(var, body) | Formula::Forall(var, body) => {
            for node in tvs.nodes() {
                let bound = assignment.clone().bind(var.clone(), node);
                if value(body, &bound)? == Kleene::Unknown {
                    return locate(tvs, body, bound, closures);
                }
            }
            Err(FocusError::new(format!("no indefinite instance of {formula}")))
        }
        Formula::Equal(..) => Err(FocusError::new(format!(
            "cannot focus equality {formula} on a summary node"
        ))),
        Formula::Closure(_) => Err(FocusError::new(format!(
            "cannot focus transitive closure {formula}"
        ))),
        Formula::Value(_) => Err(FocusError::new("cannot focus the constant 1/2")),
    }
}

fn split(tvs: &Tvs, target: Target) -> Result<Vec<Tvs>, FocusError> {
    let Target::Atom(predicate, tuple) = target;
    let summary: Vec<Node> = tuple.iter().copied().filter(|n| tvs.is_summary(*n)).collect();

    let mut zero = tvs.clone();
    zero.set(&predicate, &tuple, Kleene::False);
    let mut one = tvs.clone();
    one.set(&predicate, &tuple, Kleene::True);

    match (tuple.as_slice(), summary.as_slice()) {
        (_, []) => Ok(vec![zero, one]),
        ([node], [_]) => {
            let mut mixed = tvs.clone();
            let copy = mixed.duplicate_node(*node);
            mixed.set(&predicate, &[*node], Kleene::False);
            mixed.set(&predicate, &[copy], Kleene::True);
            Ok(vec![zero, one, mixed])
        }
        _ => Err(FocusError::new(format!(
            "cannot focus {predicate} on a tuple with summary nodes"
        ))),
    }
}
