/*
 * Kleene three-valued logic
 *
 * Truth order: False < Unknown < True
 * - and = min, or = max, not swaps False/True
 *
 * Information order: False, True < Unknown
 * - join is the least upper bound (used by blur)
 */

use std::fmt;

use serde::{Deserialize, Serialize};

/// Three-valued truth value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kleene {
    False,
    Unknown,
    True,
}

impl Kleene {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Kleene::True
        } else {
            Kleene::False
        }
    }

    pub fn and(self, other: Kleene) -> Kleene {
        self.min(other)
    }

    pub fn or(self, other: Kleene) -> Kleene {
        self.max(other)
    }

    pub fn not(self) -> Kleene {
        match self {
            Kleene::False => Kleene::True,
            Kleene::Unknown => Kleene::Unknown,
            Kleene::True => Kleene::False,
        }
    }

    pub fn implies(self, other: Kleene) -> Kleene {
        self.not().or(other)
    }

    pub fn iff(self, other: Kleene) -> Kleene {
        match (self, other) {
            (Kleene::Unknown, _) | (_, Kleene::Unknown) => Kleene::Unknown,
            (a, b) => Kleene::from_bool(a == b),
        }
    }

    /// Least upper bound in the information order
    pub fn join(self, other: Kleene) -> Kleene {
        if self == other {
            self
        } else {
            Kleene::Unknown
        }
    }

    pub fn is_definite(self) -> bool {
        self != Kleene::Unknown
    }
}

impl fmt::Display for Kleene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Kleene::False => "0",
            Kleene::Unknown => "1/2",
            Kleene::True => "1",
        };
        f.write_str(text)
    }
}
