pub mod transition_relation;

pub use transition_relation::{AbstractState, TraceStep, TransitionRelation};
