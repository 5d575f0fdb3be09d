// sluice/src/pipeline/mod.rs

//! Defines the `Pipeline<M>` struct, its stage declaration, the stage worker
//! pools, the error aggregator and the run orchestrator.

pub mod definition;
pub mod execution;
pub mod steps;

pub(crate) mod aggregate;
pub(crate) mod pool;

// Re-export the main Pipeline struct
pub use definition::Pipeline;
pub use execution::{Completion, Outcome, Running};
