/*
 * Fixpoint feature
 *
 * Worklist driver and transformer pipeline over opaque structures.
 *
 * Architecture:
 * - Domain: RunContext/AnalysisStatus, typed outcomes
 * - Application: TransformerPipeline (one action, one structure),
 *   FixpointEngine (the worklist loop)
 * - Infrastructure: TransitionRelation (petgraph state graph)
 */

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{FixpointEngine, TransformerPipeline};
pub use domain::{
    AnalysisOutcome, AnalysisStatus, ApplyOutcome, ApplyResult, HaltSignal, ImprecisionSignal,
    MessageMap, Phase, RunContext,
};
pub use infrastructure::{TraceStep, TransitionRelation};
