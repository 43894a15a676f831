pub mod engine;
pub mod pipeline;

pub use engine::FixpointEngine;
pub use pipeline::TransformerPipeline;
