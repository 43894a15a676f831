/*
 * Structure layer
 *
 * Abstract states over three-valued logic.
 *
 * Architecture:
 * - Domain: Predicate/Vocabulary, Formula, Assignment, Constraint
 * - Ports: StructureOps (engine view), FormulaStructure (action view)
 * - Infrastructure: Tvs with focus/coerce/blur, RelationalSet join
 */

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::{
    Assignment, Constraint, Formula, Predicate, PredicateUpdate, TransitiveFormula, Var,
    Vocabulary,
};
pub use infrastructure::{RelationalSet, Tvs};
pub use ports::{ClosureCache, ClosureTable, FormulaStructure, StructureOps};
