//! Variable bindings produced while solving formulas

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::formula::Var;
use crate::shared::models::{Kleene, Node};

/// Partial map from variables to nodes of one structure
///
/// `kleene` records how confidently the formula that produced the binding
/// holds (`True` = definite, `Unknown` = possible). It is not part of the
/// identity: equality, hashing and ordering look at the bindings only.
#[derive(Debug, Clone)]
pub struct Assignment {
    bindings: BTreeMap<Var, Node>,
    kleene: Kleene,
}

impl Default for Assignment {
    fn default() -> Self {
        Self {
            bindings: BTreeMap::new(),
            kleene: Kleene::True,
        }
    }
}

impl Assignment {
    /// Empty, definite assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bind `var` to `node`
    pub fn bind(mut self, var: impl Into<Var>, node: Node) -> Self {
        self.bindings.insert(var.into(), node);
        self
    }

    pub fn put(&mut self, var: Var, node: Node) {
        self.bindings.insert(var, node);
    }

    pub fn remove(&mut self, var: &Var) -> Option<Node> {
        self.bindings.remove(var)
    }

    pub fn get(&self, var: &Var) -> Option<Node> {
        self.bindings.get(var).copied()
    }

    pub fn contains(&self, var: &Var) -> bool {
        self.bindings.contains_key(var)
    }

    pub fn kleene(&self) -> Kleene {
        self.kleene
    }

    pub fn with_kleene(mut self, kleene: Kleene) -> Self {
        self.kleene = kleene;
        self
    }

    pub fn is_definite(&self) -> bool {
        self.kleene == Kleene::True
    }

    /// Keep only the bindings of `vars`
    pub fn project(&self, vars: &BTreeSet<Var>) -> Assignment {
        Assignment {
            bindings: self
                .bindings
                .iter()
                .filter(|(v, _)| vars.contains(*v))
                .map(|(v, n)| (v.clone(), *n))
                .collect(),
            kleene: self.kleene,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Node)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl PartialEq for Assignment {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
    }
}

impl Eq for Assignment {}

impl Hash for Assignment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bindings.hash(state);
    }
}

impl PartialOrd for Assignment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Assignment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bindings.cmp(&other.bindings)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (var, node)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{var}->{node}")?;
        }
        f.write_str("]")
    }
}
