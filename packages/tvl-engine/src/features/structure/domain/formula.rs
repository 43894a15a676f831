//! First-order formulas with transitive closure
//!
//! Formulas are immutable trees. Sub-formulas that appear in hash keys
//! (closure caches) are shared through `Arc`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::predicate::Predicate;
use crate::shared::models::Kleene;

/// Logical variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(Arc<str>);

impl Var {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Var::new(name)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `TC(left, right)(sub_left, sub_right). body`
///
/// Holds when `right` is reachable from `left` in one or more steps of the
/// binary relation defined by `body` over `sub_left`/`sub_right`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitiveFormula {
    pub left: Var,
    pub right: Var,
    pub sub_left: Var,
    pub sub_right: Var,
    pub body: Formula,
}

impl TransitiveFormula {
    /// Whether the step relation depends only on its own two variables
    pub fn is_closed_step(&self) -> bool {
        self.body
            .free_vars()
            .iter()
            .all(|v| *v == self.sub_left || *v == self.sub_right)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    Value(Kleene),
    Atom { predicate: Predicate, args: Vec<Var> },
    Equal(Var, Var),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
    Exists(Var, Box<Formula>),
    Forall(Var, Box<Formula>),
    Closure(Arc<TransitiveFormula>),
}

impl Formula {
    pub fn truth(value: Kleene) -> Self {
        Formula::Value(value)
    }

    pub fn atom(predicate: &Predicate, args: &[&str]) -> Self {
        Formula::Atom {
            predicate: predicate.clone(),
            args: args.iter().map(|a| Var::new(a)).collect(),
        }
    }

    pub fn equal(left: &str, right: &str) -> Self {
        Formula::Equal(Var::new(left), Var::new(right))
    }

    pub fn negate(formula: Formula) -> Self {
        Formula::Not(Box::new(formula))
    }

    pub fn and(left: Formula, right: Formula) -> Self {
        Formula::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Formula, right: Formula) -> Self {
        Formula::Or(Box::new(left), Box::new(right))
    }

    pub fn implies(left: Formula, right: Formula) -> Self {
        Formula::Implies(Box::new(left), Box::new(right))
    }

    pub fn iff(left: Formula, right: Formula) -> Self {
        Formula::Iff(Box::new(left), Box::new(right))
    }

    pub fn exists(var: &str, body: Formula) -> Self {
        Formula::Exists(Var::new(var), Box::new(body))
    }

    pub fn forall(var: &str, body: Formula) -> Self {
        Formula::Forall(Var::new(var), Box::new(body))
    }

    pub fn closure(left: &str, right: &str, sub_left: &str, sub_right: &str, body: Formula) -> Self {
        Formula::Closure(Arc::new(TransitiveFormula {
            left: Var::new(left),
            right: Var::new(right),
            sub_left: Var::new(sub_left),
            sub_right: Var::new(sub_right),
            body,
        }))
    }

    /// Right-nested conjunction; `true` when empty
    pub fn and_all(formulas: impl IntoIterator<Item = Formula>) -> Self {
        let mut items: Vec<Formula> = formulas.into_iter().collect();
        let Some(mut acc) = items.pop() else {
            return Formula::Value(Kleene::True);
        };
        while let Some(next) = items.pop() {
            acc = Formula::and(next, acc);
        }
        acc
    }

    /// Variables not bound by a quantifier or closure
    pub fn free_vars(&self) -> BTreeSet<Var> {
        let mut out = BTreeSet::new();
        self.collect_free(&mut out);
        out
    }

    fn collect_free(&self, out: &mut BTreeSet<Var>) {
        match self {
            Formula::Value(_) => {}
            Formula::Atom { args, .. } => out.extend(args.iter().cloned()),
            Formula::Equal(a, b) => {
                out.insert(a.clone());
                out.insert(b.clone());
            }
            Formula::Not(f) => f.collect_free(out),
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) => {
                a.collect_free(out);
                b.collect_free(out);
            }
            Formula::Exists(v, f) | Formula::Forall(v, f) => {
                let mut inner = f.free_vars();
                inner.remove(v);
                out.extend(inner);
            }
            Formula::Closure(tc) => {
                out.insert(tc.left.clone());
                out.insert(tc.right.clone());
                let mut inner = tc.body.free_vars();
                inner.remove(&tc.sub_left);
                inner.remove(&tc.sub_right);
                out.extend(inner);
            }
        }
    }

    /// Top-level conjuncts, left to right
    pub fn conjuncts(&self) -> Vec<Formula> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(f) = stack.pop() {
            match f {
                Formula::And(a, b) => {
                    stack.push(b);
                    stack.push(a);
                }
                other => out.push(other.clone()),
            }
        }
        out
    }

    /// Every transitive-closure sub-formula, outermost first
    pub fn closures(&self) -> Vec<Arc<TransitiveFormula>> {
        let mut out = Vec::new();
        self.collect_closures(&mut out);
        out
    }

    fn collect_closures(&self, out: &mut Vec<Arc<TransitiveFormula>>) {
        match self {
            Formula::Value(_) | Formula::Atom { .. } | Formula::Equal(..) => {}
            Formula::Not(f) | Formula::Exists(_, f) | Formula::Forall(_, f) => {
                f.collect_closures(out)
            }
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) => {
                a.collect_closures(out);
                b.collect_closures(out);
            }
            Formula::Closure(tc) => {
                if !out.contains(tc) {
                    out.push(tc.clone());
                }
                tc.body.collect_closures(out);
            }
        }
    }

    /// First atom whose argument count differs from its predicate's arity
    pub fn arity_mismatch(&self) -> Option<(Predicate, usize)> {
        match self {
            Formula::Atom { predicate, args } if predicate.arity() != args.len() => {
                Some((predicate.clone(), args.len()))
            }
            Formula::Value(_) | Formula::Atom { .. } | Formula::Equal(..) => None,
            Formula::Not(f) | Formula::Exists(_, f) | Formula::Forall(_, f) => f.arity_mismatch(),
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) => {
                a.arity_mismatch().or_else(|| b.arity_mismatch())
            }
            Formula::Closure(tc) => tc.body.arity_mismatch(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Value(k) => write!(f, "{k}"),
            Formula::Atom { predicate, args } if args.is_empty() => write!(f, "{predicate}()"),
            Formula::Atom { predicate, args } => {
                write!(f, "{predicate}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Formula::Equal(a, b) => write!(f, "{a} == {b}"),
            Formula::Not(inner) => write!(f, "!{inner}"),
            Formula::And(a, b) => write!(f, "({a} & {b})"),
            Formula::Or(a, b) => write!(f, "({a} | {b})"),
            Formula::Implies(a, b) => write!(f, "({a} -> {b})"),
            Formula::Iff(a, b) => write!(f, "({a} <-> {b})"),
            Formula::Exists(v, body) => write!(f, "E({v}). {body}"),
            Formula::Forall(v, body) => write!(f, "A({v}). {body}"),
            Formula::Closure(tc) => write!(
                f,
                "TC({}, {})({}, {}). {}",
                tc.left, tc.right, tc.sub_left, tc.sub_right, tc.body
            ),
        }
    }
}

/// `predicate(args) = formula`, one entry of an action's update block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredicateUpdate {
    pub predicate: Predicate,
    pub args: Vec<Var>,
    pub formula: Formula,
}

impl PredicateUpdate {
    pub fn new(predicate: &Predicate, args: &[&str], formula: Formula) -> Self {
        Self {
            predicate: predicate.clone(),
            args: args.iter().map(|a| Var::new(a)).collect(),
            formula,
        }
    }
}

impl fmt::Display for PredicateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<&str> = self.args.iter().map(Var::name).collect();
        write!(f, "{}({}) = {}", self.predicate, args.join(", "), self.formula)
    }
}
