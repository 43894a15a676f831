//! Predicates and the vocabulary that interns them

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};

#[derive(Debug)]
struct PredicateInfo {
    id: usize,
    name: String,
    arity: usize,
    abstraction: bool,
}

/// Interned relation symbol
///
/// Cheap to clone. Equality, hashing and ordering use the vocabulary id, so
/// predicates from different vocabularies must not be mixed.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateInfo>);

impl Predicate {
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn arity(&self) -> usize {
        self.0.arity
    }

    /// Unary predicate used to name nodes during blur
    pub fn is_abstraction(&self) -> bool {
        self.0.abstraction
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl PartialOrd for Predicate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Predicate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Append-only predicate registry
#[derive(Debug, Default, Clone)]
pub struct Vocabulary {
    predicates: Vec<Predicate>,
    by_name: FxHashMap<String, Predicate>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a predicate, or return the existing one with the same name
    ///
    /// Redeclaring a name with a different arity or abstraction flag is an
    /// error.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        arity: usize,
        abstraction: bool,
    ) -> Result<Predicate> {
        let name = name.into();
        if let Some(existing) = self.by_name.get(&name) {
            if existing.arity() != arity || existing.is_abstraction() != abstraction {
                return Err(EngineError::semantic(format!(
                    "predicate {name} redeclared with arity {arity} (was {})",
                    existing.arity()
                )));
            }
            return Ok(existing.clone());
        }
        if abstraction && arity != 1 {
            return Err(EngineError::semantic(format!(
                "abstraction predicate {name} must be unary"
            )));
        }

        let predicate = Predicate(Arc::new(PredicateInfo {
            id: self.predicates.len(),
            name: name.clone(),
            arity,
            abstraction,
        }));
        self.predicates.push(predicate.clone());
        self.by_name.insert(name, predicate.clone());
        Ok(predicate)
    }

    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.by_name.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }

    /// Unary abstraction predicates in declaration order
    pub fn abstraction_predicates(&self) -> Vec<Predicate> {
        self.predicates
            .iter()
            .filter(|p| p.is_abstraction())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
