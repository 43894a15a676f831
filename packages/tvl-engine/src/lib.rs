/*
 * TVL Engine - Three-Valued-Logic Abstract Interpretation
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Kleene values, node handles
 * - features/    : structure (abstract states) → transition_system (CFG,
 *                  actions) → fixpoint (pipeline, worklist driver)
 * - config/      : EngineConfig, presets, YAML
 * - errors       : EngineError
 *
 * Usage:
 *   let mut graph = AnalysisGraph::new();
 *   graph.add_action("L0", action, "L1");
 *   let mut engine = FixpointEngine::new(graph, EngineConfig::default())?;
 *   let outcome = engine.evaluate(initial_structures)?;
 */

#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::type_complexity)] // Message maps keyed by structures

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration
pub mod config;

/// Error types
pub mod errors;

/// Feature modules
pub mod features;

/// Shared models
pub mod shared;

pub use config::{EngineConfig, Preset};
pub use errors::{EngineError, Result};
pub use features::fixpoint::{AnalysisOutcome, AnalysisStatus, FixpointEngine, TransformerPipeline};
pub use features::structure::{FormulaStructure, StructureOps, Tvs};
pub use features::transition_system::{Action, ActionOps, AnalysisGraph};
pub use shared::models::{Kleene, Node};
