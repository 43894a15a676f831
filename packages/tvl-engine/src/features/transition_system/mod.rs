/*
 * Transition system
 *
 * The program under analysis: a CFG whose edges carry abstract
 * transformers.
 *
 * Architecture:
 * - Domain: Action (formula-driven transformer), Location, AnalysisGraph
 * - Ports: ActionOps (what the transformer pipeline calls)
 */

pub mod domain;
pub mod ports;

pub use domain::{Action, AnalysisGraph, Edge, EdgeId, Location, LocationId, ReportMessage};
pub use ports::{ActionOps, MessageReport};
