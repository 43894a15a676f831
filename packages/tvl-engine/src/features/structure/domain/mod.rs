pub mod assignment;
pub mod constraint;
pub mod formula;
pub mod predicate;

pub use assignment::Assignment;
pub use constraint::Constraint;
pub use formula::{Formula, PredicateUpdate, TransitiveFormula, Var};
pub use predicate::{Predicate, Vocabulary};
