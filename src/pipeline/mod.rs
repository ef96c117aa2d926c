// src/pipeline/mod.rs
// =============================================================================
// This module runs the measurement pipeline.
//
// Submodules:
// - orchestrator: Owns the channels and the start/stop order of all tasks
// - collector: The single writer of the JSON-lines output
// =============================================================================

mod collector;
mod orchestrator;

pub use orchestrator::{run_pipeline, PipelineConfig, PipelineSummary};
