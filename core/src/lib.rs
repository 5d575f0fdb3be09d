// sluice/src/lib.rs

//! Sluice: a typed, linear, multi-stage concurrent pipeline for Rust.
//!
//! A pipeline is a chain of stages over one message type `M`. Each stage runs a
//! caller-supplied step on a pool of parallel workers, and adjacent stages are
//! joined by unbuffered hand-off points, so a slow stage naturally stalls the
//! ones before it. Features:
//!  - Transform steps (one in, one out), sync or async.
//!  - Producer steps that emit any number of outputs per input.
//!  - Per-stage worker counts; order is preserved only through single-worker stages.
//!  - Cascading shutdown: a stage's output closes only after its workers and
//!    every upstream stage have stopped.
//!  - Step errors never stop the pipeline; they are aggregated into one terminal result.
//!  - Cooperative cancellation at every hand-off point via a `CancellationToken`.

pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;

// --- Re-exports for the Public API ---

pub use crate::core::collected::Collected;
pub use crate::core::handoff::{Emitter, Input};
pub use crate::core::step::{Producer, Transform};

pub use crate::pipeline::definition::Pipeline;
pub use crate::pipeline::execution::{Completion, Outcome, Running};

pub use crate::config::PipelineConfig;
pub use crate::error::{AggregateError, PipelineError, PipelineResult};

// Callers construct pipelines with a token, so re-export the type they need.
pub use tokio_util::sync::CancellationToken;

/*
    Core Workflow:
    1. Create a `Pipeline<M>` with a `CancellationToken`.
    2. Declare stages in order with `.add_step(n, f)`, `.add_async_step(n, f)`,
       `.add_producer_step(n, f)` or the trait-based `.add_transform` / `.add_producer`.
    3. Call `.run(collector)` inside a Tokio runtime to get `Running { input, outcome, completion }`.
    4. Send messages with `input.send(m).await`, then `input.close()`.
    5. `completion.wait().await` joins every task; `outcome.await` yields `Ok(())`
       or the aggregated errors.
*/
