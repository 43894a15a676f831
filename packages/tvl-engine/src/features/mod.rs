//! Vertical slices: structure layer, transition system, fixpoint driver

pub mod fixpoint;
pub mod structure;
pub mod transition_system;
