//! Consistency rules enforced by coerce

use std::fmt;

use super::formula::Formula;
use crate::errors::{EngineError, Result};
use crate::shared::models::Kleene;

/// `body ==> head`, universally quantified over the free variables
///
/// The head is a literal: an atom, a negated atom, an equality, or `0`.
/// Coerce sharpens an unknown head to the value that makes it true and
/// reports a breach when the head is definitely false.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    body: Formula,
    head: Formula,
}

impl Constraint {
    pub fn new(body: Formula, head: Formula) -> Result<Self> {
        let literal = match &head {
            Formula::Atom { .. } | Formula::Equal(..) | Formula::Value(Kleene::False) => true,
            Formula::Not(inner) => matches!(**inner, Formula::Atom { .. } | Formula::Equal(..)),
            _ => false,
        };
        if !literal {
            return Err(EngineError::semantic(format!(
                "constraint head {head} is not a literal"
            )));
        }
        Ok(Self { body, head })
    }

    pub fn body(&self) -> &Formula {
        &self.body
    }

    pub fn head(&self) -> &Formula {
        &self.head
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ==> {}", self.body, self.head)
    }
}
