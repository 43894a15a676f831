/*
 * Structure Ports
 *
 * Two layers of abstraction over an abstract state:
 * - StructureOps: what the fixpoint driver and pipeline need
 *   (copy via Clone, identity via Eq/Hash, coerce, blur)
 * - FormulaStructure: what the formula-driven Action needs
 *   (node enumeration, evaluation, focus, simultaneous update)
 *
 * The driver is generic over StructureOps only, so engine tests can run
 * on fakes without any three-valued semantics.
 */

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::{FocusError, Result};
use crate::features::structure::domain::{
    Assignment, Formula, Predicate, PredicateUpdate, TransitiveFormula, Var,
};
use crate::shared::models::{Kleene, Node};

/// Opaque abstract state as seen by the fixpoint engine
///
/// Equality must identify structures that the join set treats as the same
/// element (for canonical structures, isomorphism).
pub trait StructureOps: Clone + Eq + Hash + Debug {
    /// Re-assert consistency rules in place; `false` means infeasible
    fn coerce(&mut self) -> bool;

    /// Merge nodes indistinguishable by the abstraction predicates
    fn blur(&mut self);

    /// Number of nodes, for statistics only
    fn node_count(&self) -> usize;
}

/// Reachability table of one transitive-closure formula
#[derive(Debug, Clone, Default)]
pub struct ClosureTable {
    values: FxHashMap<(Node, Node), Kleene>,
}

impl ClosureTable {
    pub fn insert(&mut self, from: Node, to: Node, value: Kleene) {
        if value == Kleene::False {
            self.values.remove(&(from, to));
        } else {
            self.values.insert((from, to), value);
        }
    }

    pub fn get(&self, from: Node, to: Node) -> Kleene {
        self.values
            .get(&(from, to))
            .copied()
            .unwrap_or(Kleene::False)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Explicitly scoped closure tables for one structure
///
/// Filled before a precondition search and cleared after it, so tables
/// never leak from one structure to the next.
#[derive(Debug, Default)]
pub struct ClosureCache {
    tables: FxHashMap<Arc<TransitiveFormula>, ClosureTable>,
}

impl ClosureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, formula: Arc<TransitiveFormula>, table: ClosureTable) {
        self.tables.insert(formula, table);
    }

    pub fn get(&self, formula: &TransitiveFormula) -> Option<&ClosureTable> {
        self.tables.get(formula)
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Structure that understands formulas
pub trait FormulaStructure: StructureOps {
    /// Nodes in ascending order
    fn nodes(&self) -> Vec<Node>;

    /// Value of `formula` under `assignment`, which must bind every free
    /// variable
    fn eval(&self, formula: &Formula, assignment: &Assignment, closures: &ClosureCache)
        -> Result<Kleene>;

    /// Extensions of `partial` over the unbound free variables of `formula`
    /// for which the formula is not false
    ///
    /// Each result's kleene is the conjunction of `partial`'s kleene and the
    /// formula's value.
    fn eval_formula(
        &self,
        formula: &Formula,
        partial: &Assignment,
        closures: &ClosureCache,
    ) -> Result<Vec<Assignment>> {
        let unbound: Vec<Var> = formula
            .free_vars()
            .into_iter()
            .filter(|v| !partial.contains(v))
            .collect();
        let nodes = self.nodes();
        let mut results = Vec::new();

        if !unbound.is_empty() && nodes.is_empty() {
            return Ok(results);
        }

        // Odometer over nodes^unbound
        let mut digits = vec![0usize; unbound.len()];
        loop {
            let mut candidate = partial.clone();
            for (var, digit) in unbound.iter().zip(&digits) {
                candidate.put(var.clone(), nodes[*digit]);
            }
            let value = self.eval(formula, &candidate, closures)?;
            if value != Kleene::False {
                let kleene = partial.kleene().and(value);
                results.push(candidate.with_kleene(kleene));
            }

            let mut position = 0;
            loop {
                if position == digits.len() {
                    return Ok(results);
                }
                digits[position] += 1;
                if digits[position] < nodes.len() {
                    break;
                }
                digits[position] = 0;
                position += 1;
            }
        }
    }

    /// Split into structures where every focus formula is definite
    fn focus(&self, formulas: &[Formula], limit: usize) -> std::result::Result<Vec<Self>, FocusError>;

    /// Overwrite every updated predicate with its formula's value on `base`
    ///
    /// All formulas read `base`, so the update is simultaneous.
    fn update_predicates(
        &mut self,
        base: &Self,
        updates: &[PredicateUpdate],
        assignment: &Assignment,
    ) -> Result<()>;

    /// Reachability table for a closure formula, with `outer` binding any
    /// extra free variables of its step relation
    fn closure_table(&self, formula: &TransitiveFormula, outer: &Assignment) -> Result<ClosureTable>;

    fn allocate_node(&mut self) -> Node;

    fn remove_node(&mut self, node: Node);

    fn set_value(&mut self, predicate: &Predicate, tuple: &[Node], value: Kleene);

    /// Reset a predicate to false everywhere
    fn clear_predicate(&mut self, predicate: &Predicate);
}
