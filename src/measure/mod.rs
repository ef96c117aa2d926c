// src/measure/mod.rs
// =============================================================================
// This module contains the measurement logic.
//
// Submodules:
// - walker: Follows the redirect chain of one URL, hop by hop
// - worker: Pulls URLs from a channel and runs the walker on each
// =============================================================================

mod walker;
mod worker;

pub use walker::{Measurement, Walker, WalkerConfig};
pub use worker::{spawn_workers, SharedUrls};

#[cfg(test)]
pub use walker::{RequestInfo, Response, TOO_MANY_REDIRECTIONS};
