/*
 * Three-Valued Structure (TVS)
 *
 * Storage:
 * - nodes / summary: ordered node sets
 * - values: predicate -> tuple -> Kleene, only non-false entries stored
 *
 * Identity:
 * - Eq/Hash over nodes, summary flags and values
 * - After blur nodes are renumbered canonically, so two blurred
 *   structures are equal exactly when they are isomorphic
 *
 * Evaluation:
 * - Kleene semantics, equality is 1/2 on a summary node
 * - Transitive closure: non-reflexive max-min closure of the step
 *   relation (Floyd-Warshall over Kleene values)
 *
 * References:
 * - Sagiv, Reps & Wilhelm (2002) "Parametric Shape Analysis via 3-Valued Logic"
 */

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::warn;

use super::{blur, coerce, focus};
use crate::errors::{EngineError, FocusError, Result};
use crate::features::structure::domain::{
    Assignment, Constraint, Formula, Predicate, PredicateUpdate, TransitiveFormula, Var,
    Vocabulary,
};
use crate::features::structure::ports::{
    ClosureCache, ClosureTable, FormulaStructure, StructureOps,
};
use crate::shared::models::{Kleene, Node};

/// Production abstract state
#[derive(Clone)]
pub struct Tvs {
    pub(super) nodes: BTreeSet<Node>,
    pub(super) summary: BTreeSet<Node>,
    pub(super) next_node: u32,
    pub(super) values: BTreeMap<Predicate, BTreeMap<Vec<Node>, Kleene>>,
    vocabulary: Arc<Vocabulary>,
    pub(super) constraints: Arc<[Constraint]>,
}

impl Tvs {
    /// Empty structure over `vocabulary`, without constraints
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            nodes: BTreeSet::new(),
            summary: BTreeSet::new(),
            next_node: 0,
            values: BTreeMap::new(),
            vocabulary,
            constraints: Arc::from(Vec::new()),
        }
    }

    /// Builder: consistency rules enforced by coerce
    pub fn with_constraints(mut self, constraints: Arc<[Constraint]>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn add_node(&mut self) -> Node {
        let node = Node(self.next_node);
        self.next_node += 1;
        self.nodes.insert(node);
        node
    }

    pub fn node_set(&self) -> &BTreeSet<Node> {
        &self.nodes
    }

    pub fn is_summary(&self, node: Node) -> bool {
        self.summary.contains(&node)
    }

    pub fn set_summary(&mut self, node: Node, summary: bool) {
        if summary {
            self.summary.insert(node);
        } else {
            self.summary.remove(&node);
        }
    }

    pub fn get(&self, predicate: &Predicate, tuple: &[Node]) -> Kleene {
        self.values
            .get(predicate)
            .and_then(|table| table.get(tuple))
            .copied()
            .unwrap_or(Kleene::False)
    }

    /// Store one value; a tuple of the wrong arity or with a foreign node is
    /// dropped with a warning (see `try_set`)
    pub fn set(&mut self, predicate: &Predicate, tuple: &[Node], value: Kleene) {
        if let Err(err) = self.try_set(predicate, tuple, value) {
            warn!(error = %err, "tuple ignored");
        }
    }

    /// Store one value, rejecting a tuple that breaks the arity or node
    /// ownership invariant
    pub fn try_set(&mut self, predicate: &Predicate, tuple: &[Node], value: Kleene) -> Result<()> {
        if tuple.len() != predicate.arity() {
            return Err(EngineError::semantic(format!(
                "predicate {predicate} expects {} arguments, got {}",
                predicate.arity(),
                tuple.len()
            )));
        }
        if let Some(node) = tuple.iter().find(|node| !self.nodes.contains(*node)) {
            return Err(EngineError::semantic(format!(
                "node {} of predicate {predicate} is not part of the structure",
                node.0
            )));
        }
        self.store(predicate, tuple, value);
        Ok(())
    }

    fn store(&mut self, predicate: &Predicate, tuple: &[Node], value: Kleene) {
        if value == Kleene::False {
            if let Some(table) = self.values.get_mut(predicate) {
                table.remove(tuple);
                if table.is_empty() {
                    self.values.remove(predicate);
                }
            }
        } else {
            self.values
                .entry(predicate.clone())
                .or_default()
                .insert(tuple.to_vec(), value);
        }
    }

    /// Non-false tuples of one predicate
    pub fn tuples(&self, predicate: &Predicate) -> impl Iterator<Item = (&Vec<Node>, Kleene)> {
        self.values
            .get(predicate)
            .into_iter()
            .flat_map(|table| table.iter().map(|(t, v)| (t, *v)))
    }

    /// Copy every value of `from` onto a fresh node; returns the copy
    pub(super) fn duplicate_node(&mut self, from: Node) -> Node {
        let copy = self.add_node();
        if self.is_summary(from) {
            self.summary.insert(copy);
        }
        for table in self.values.values_mut() {
            let additions: Vec<(Vec<Node>, Kleene)> = table
                .iter()
                .filter(|(tuple, _)| tuple.contains(&from))
                .flat_map(|(tuple, value)| substitutions(tuple, from, copy).map(move |t| (t, *value)))
                .collect();
            table.extend(additions);
        }
        copy
    }

    fn lookup(&self, var: &Var, assignment: &Assignment) -> Result<Node> {
        assignment
            .get(var)
            .ok_or_else(|| EngineError::semantic(format!("unbound variable {var}")))
    }

    fn eval_in(
        &self,
        formula: &Formula,
        assignment: &mut Assignment,
        closures: &ClosureCache,
    ) -> Result<Kleene> {
        Ok(match formula {
            Formula::Value(k) => *k,
            Formula::Atom { predicate, args } => {
                if predicate.arity() != args.len() {
                    return Err(EngineError::semantic(format!(
                        "predicate {predicate} applied to {} arguments",
                        args.len()
                    )));
                }
                let tuple = args
                    .iter()
                    .map(|a| self.lookup(a, assignment))
                    .collect::<Result<Vec<Node>>>()?;
                self.get(predicate, &tuple)
            }
            Formula::Equal(a, b) => {
                let left = self.lookup(a, assignment)?;
                let right = self.lookup(b, assignment)?;
                if left != right {
                    Kleene::False
                } else if self.is_summary(left) {
                    Kleene::Unknown
                } else {
                    Kleene::True
                }
            }
            Formula::Not(f) => self.eval_in(f, assignment, closures)?.not(),
            Formula::And(a, b) => {
                let left = self.eval_in(a, assignment, closures)?;
                if left == Kleene::False {
                    Kleene::False
                } else {
                    left.and(self.eval_in(b, assignment, closures)?)
                }
            }
            Formula::Or(a, b) => {
                let left = self.eval_in(a, assignment, closures)?;
                if left == Kleene::True {
                    Kleene::True
                } else {
                    left.or(self.eval_in(b, assignment, closures)?)
                }
            }
            Formula::Implies(a, b) => {
                let left = self.eval_in(a, assignment, closures)?;
                if left == Kleene::False {
                    Kleene::True
                } else {
                    left.implies(self.eval_in(b, assignment, closures)?)
                }
            }
            Formula::Iff(a, b) => self
                .eval_in(a, assignment, closures)?
                .iff(self.eval_in(b, assignment, closures)?),
            Formula::Exists(v, body) => {
                self.quantify(v, body, assignment, closures, Kleene::False, Kleene::True)?
            }
            Formula::Forall(v, body) => {
                self.quantify(v, body, assignment, closures, Kleene::True, Kleene::False)?
            }
            Formula::Closure(tc) => {
                let from = self.lookup(&tc.left, assignment)?;
                let to = self.lookup(&tc.right, assignment)?;
                match closures.get(tc) {
                    Some(table) => table.get(from, to),
                    None => self.closure_table(tc, assignment)?.get(from, to),
                }
            }
        })
    }

    /// Fold `body` over all nodes with `start`, stopping at `absorbing`
    fn quantify(
        &self,
        var: &Var,
        body: &Formula,
        assignment: &mut Assignment,
        closures: &ClosureCache,
        start: Kleene,
        absorbing: Kleene,
    ) -> Result<Kleene> {
        let shadowed = assignment.get(var);
        let mut acc = start;
        for node in &self.nodes {
            assignment.put(var.clone(), *node);
            let value = self.eval_in(body, assignment, closures)?;
            acc = if start == Kleene::False {
                acc.or(value)
            } else {
                acc.and(value)
            };
            if acc == absorbing {
                break;
            }
        }
        restore(assignment, var, shadowed);
        Ok(acc)
    }
}

/// Undo a temporary binding
fn restore(assignment: &mut Assignment, var: &Var, previous: Option<Node>) {
    match previous {
        Some(node) => assignment.put(var.clone(), node),
        None => {
            assignment.remove(var);
        }
    }
}

/// Every tuple obtained by replacing a non-empty subset of `from`
/// occurrences in `tuple` with `to`
fn substitutions(tuple: &[Node], from: Node, to: Node) -> impl Iterator<Item = Vec<Node>> {
    let positions: Vec<usize> = tuple
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == from)
        .map(|(i, _)| i)
        .collect();
    let tuple = tuple.to_vec();
    (1u32..(1 << positions.len())).map(move |mask| {
        let mut out = tuple.clone();
        for (bit, position) in positions.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                out[*position] = to;
            }
        }
        out
    })
}

impl PartialEq for Tvs {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.summary == other.summary && self.values == other.values
    }
}

impl Eq for Tvs {}

impl Hash for Tvs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nodes.hash(state);
        self.summary.hash(state);
        self.values.hash(state);
    }
}

impl fmt::Debug for Tvs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Tvs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self
            .nodes
            .iter()
            .map(|n| {
                if self.is_summary(*n) {
                    format!("{n}*")
                } else {
                    n.to_string()
                }
            })
            .collect();
        write!(f, "{{{}}}", nodes.join(", "))?;
        for (predicate, table) in &self.values {
            let entries: Vec<String> = table
                .iter()
                .map(|(tuple, value)| {
                    let tuple: Vec<String> = tuple.iter().map(Node::to_string).collect();
                    format!("({})={value}", tuple.join(","))
                })
                .collect();
            write!(f, " {predicate}:[{}]", entries.join(" "))?;
        }
        Ok(())
    }
}

impl StructureOps for Tvs {
    fn coerce(&mut self) -> bool {
        coerce::coerce(self)
    }

    fn blur(&mut self) {
        blur::blur(self);
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl FormulaStructure for Tvs {
    fn nodes(&self) -> Vec<Node> {
        self.nodes.iter().copied().collect()
    }

    fn eval(
        &self,
        formula: &Formula,
        assignment: &Assignment,
        closures: &ClosureCache,
    ) -> Result<Kleene> {
        let mut scratch = assignment.clone();
        self.eval_in(formula, &mut scratch, closures)
    }

    fn focus(&self, formulas: &[Formula], limit: usize) -> std::result::Result<Vec<Self>, FocusError> {
        focus::focus(self, formulas, limit)
    }

    fn update_predicates(
        &mut self,
        base: &Self,
        updates: &[PredicateUpdate],
        assignment: &Assignment,
    ) -> Result<()> {
        let closures = ClosureCache::new();
        let nodes = base.nodes();
        let mut staged = Vec::with_capacity(updates.len());

        for update in updates {
            let mut table = Vec::new();
            for tuple in tuples_of(&nodes, update.args.len()) {
                let mut extended = assignment.clone();
                for (var, node) in update.args.iter().zip(&tuple) {
                    extended.put(var.clone(), *node);
                }
                let value = base.eval(&update.formula, &extended, &closures)?;
                if value != Kleene::False {
                    table.push((tuple, value));
                }
            }
            staged.push((update.predicate.clone(), table));
        }

        for (predicate, table) in staged {
            self.clear_predicate(&predicate);
            for (tuple, value) in table {
                self.set(&predicate, &tuple, value);
            }
        }
        Ok(())
    }

    fn closure_table(&self, formula: &TransitiveFormula, outer: &Assignment) -> Result<ClosureTable> {
        let nodes = self.nodes();
        let size = nodes.len();
        let closures = ClosureCache::new();
        let mut matrix = vec![vec![Kleene::False; size]; size];

        for (i, from) in nodes.iter().enumerate() {
            for (j, to) in nodes.iter().enumerate() {
                let step = outer
                    .clone()
                    .bind(formula.sub_left.clone(), *from)
                    .bind(formula.sub_right.clone(), *to);
                matrix[i][j] = self.eval(&formula.body, &step, &closures)?;
            }
        }

        for k in 0..size {
            for i in 0..size {
                if matrix[i][k] == Kleene::False {
                    continue;
                }
                for j in 0..size {
                    let through = matrix[i][k].and(matrix[k][j]);
                    matrix[i][j] = matrix[i][j].or(through);
                }
            }
        }

        let mut table = ClosureTable::default();
        for (i, from) in nodes.iter().enumerate() {
            for (j, to) in nodes.iter().enumerate() {
                table.insert(*from, *to, matrix[i][j]);
            }
        }
        Ok(table)
    }

    fn allocate_node(&mut self) -> Node {
        self.add_node()
    }

    fn remove_node(&mut self, node: Node) {
        self.nodes.remove(&node);
        self.summary.remove(&node);
        for table in self.values.values_mut() {
            table.retain(|tuple, _| !tuple.contains(&node));
        }
        self.values.retain(|_, table| !table.is_empty());
    }

    fn set_value(&mut self, predicate: &Predicate, tuple: &[Node], value: Kleene) {
        self.set(predicate, tuple, value);
    }

    fn clear_predicate(&mut self, predicate: &Predicate) {
        self.values.remove(predicate);
    }
}

/// All `arity`-tuples over `nodes`, lexicographic
pub(super) fn tuples_of(nodes: &[Node], arity: usize) -> Vec<Vec<Node>> {
    let mut out = vec![Vec::with_capacity(arity)];
    for _ in 0..arity {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                nodes.iter().map(move |n| {
                    let mut next = prefix.clone();
                    next.push(*n);
                    next
                })
            })
            .collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_vocabulary() -> (Arc<Vocabulary>, Predicate, Predicate) {
        let mut vocabulary = Vocabulary::new();
        let x = vocabulary.declare("x", 1, true).unwrap();
        let n = vocabulary.declare("n", 2, false).unwrap();
        (Arc::new(vocabulary), x, n)
    }

    #[test]
    fn test_equality_on_summary_is_unknown() {
        let (vocabulary, _, _) = list_vocabulary();
        let mut tvs = Tvs::new(vocabulary);
        let u = tvs.add_node();
        tvs.set_summary(u, true);
        let assignment = Assignment::new().bind("a", u).bind("b", u);
        let value = tvs
            .eval(&Formula::equal("a", "b"), &assignment, &ClosureCache::new())
            .unwrap();
        assert_eq!(value, Kleene::Unknown);
    }

    #[test]
    fn test_exists_over_unknown() {
        let (vocabulary, x, _) = list_vocabulary();
        let mut tvs = Tvs::new(vocabulary);
        let u = tvs.add_node();
        let w = tvs.add_node();
        tvs.set(&x, &[u], Kleene::Unknown);
        tvs.set(&x, &[w], Kleene::False);
        let f = Formula::exists("v", Formula::atom(&x, &["v"]));
        let value = tvs.eval(&f, &Assignment::new(), &ClosureCache::new()).unwrap();
        assert_eq!(value, Kleene::Unknown);
    }

    #[test]
    fn test_unbound_variable_is_semantic_error() {
        let (vocabulary, x, _) = list_vocabulary();
        let tvs = Tvs::new(vocabulary);
        let result = tvs.eval(&Formula::atom(&x, &["v"]), &Assignment::new(), &ClosureCache::new());
        assert!(matches!(result, Err(EngineError::Semantic { .. })));
    }

    #[test]
    fn test_transitive_closure_chain() {
        let (vocabulary, _, n) = list_vocabulary();
        let mut tvs = Tvs::new(vocabulary);
        let a = tvs.add_node();
        let b = tvs.add_node();
        let c = tvs.add_node();
        tvs.set(&n, &[a, b], Kleene::True);
        tvs.set(&n, &[b, c], Kleene::Unknown);

        let tc = Formula::closure("l", "r", "s", "t", Formula::atom(&n, &["s", "t"]));
        let eval = |from, to| {
            tvs.eval(
                &tc,
                &Assignment::new().bind("l", from).bind("r", to),
                &ClosureCache::new(),
            )
            .unwrap()
        };
        assert_eq!(eval(a, b), Kleene::True);
        assert_eq!(eval(a, c), Kleene::Unknown);
        assert_eq!(eval(c, a), Kleene::False);
        // non-reflexive
        assert_eq!(eval(a, a), Kleene::False);
    }

    #[test]
    fn test_update_is_simultaneous() {
        let mut vocabulary = Vocabulary::new();
        let p = vocabulary.declare("p", 0, false).unwrap();
        let q = vocabulary.declare("q", 0, false).unwrap();
        let mut tvs = Tvs::new(Arc::new(vocabulary));
        tvs.set(&p, &[], Kleene::True);

        // swap p and q
        let updates = vec![
            PredicateUpdate::new(&p, &[], Formula::atom(&q, &[])),
            PredicateUpdate::new(&q, &[], Formula::atom(&p, &[])),
        ];
        let base = tvs.clone();
        tvs.update_predicates(&base, &updates, &Assignment::new()).unwrap();
        assert_eq!(tvs.get(&p, &[]), Kleene::False);
        assert_eq!(tvs.get(&q, &[]), Kleene::True);
    }

    #[test]
    fn test_try_set_rejects_wrong_arity() {
        let (vocabulary, x, n) = list_vocabulary();
        let mut tvs = Tvs::new(vocabulary);
        let a = tvs.add_node();
        assert!(matches!(
            tvs.try_set(&n, &[a], Kleene::True),
            Err(EngineError::Semantic { .. })
        ));
        assert!(tvs.try_set(&x, &[a, a], Kleene::True).is_err());
        assert_eq!(tvs.tuples(&n).count(), 0);
        assert_eq!(tvs.tuples(&x).count(), 0);
    }

    #[test]
    fn test_foreign_node_is_not_stored() {
        let (vocabulary, x, _) = list_vocabulary();
        let mut tvs = Tvs::new(vocabulary);
        let a = tvs.add_node();
        assert!(tvs.try_set(&x, &[Node(7)], Kleene::True).is_err());

        tvs.set(&x, &[Node(7)], Kleene::True);
        assert_eq!(tvs.get(&x, &[Node(7)]), Kleene::False);
        assert_eq!(tvs.tuples(&x).count(), 0);

        tvs.blur();
        assert_eq!(tvs.nodes(), vec![a]);
        assert_eq!(tvs.tuples(&x).count(), 0);
    }

    #[test]
    fn test_remove_node_drops_tuples() {
        let (vocabulary, x, n) = list_vocabulary();
        let mut tvs = Tvs::new(vocabulary);
        let a = tvs.add_node();
        let b = tvs.add_node();
        tvs.set(&x, &[a], Kleene::True);
        tvs.set(&n, &[a, b], Kleene::True);
        tvs.remove_node(a);
        assert_eq!(tvs.nodes(), vec![b]);
        assert_eq!(tvs.tuples(&n).count(), 0);
        assert_eq!(tvs.tuples(&x).count(), 0);
    }

    #[test]
    fn test_duplicate_node_copies_self_loops() {
        let (vocabulary, _, n) = list_vocabulary();
        let mut tvs = Tvs::new(vocabulary);
        let a = tvs.add_node();
        tvs.set(&n, &[a, a], Kleene::Unknown);
        let copy = tvs.duplicate_node(a);
        for tuple in [[a, a], [a, copy], [copy, a], [copy, copy]] {
            assert_eq!(tvs.get(&n, &tuple), Kleene::Unknown);
        }
    }
}
