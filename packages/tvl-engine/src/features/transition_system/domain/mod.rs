pub mod action;
pub mod analysis_graph;
pub mod location;

pub use action::{Action, ReportMessage};
pub use analysis_graph::{AnalysisGraph, Edge};
pub use location::{EdgeId, Location, LocationId};
