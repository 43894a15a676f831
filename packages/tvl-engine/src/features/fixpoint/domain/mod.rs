pub mod outcome;
pub mod run_context;

pub use outcome::{
    AnalysisOutcome, ApplyOutcome, ApplyResult, HaltSignal, ImprecisionSignal, MessageMap,
};
pub use run_context::{AnalysisStatus, Phase, RunContext};
