// sluice/src/config.rs

//! Tunables for a `Pipeline`. The defaults give unbuffered (rendezvous)
//! hand-offs; callers rarely need anything else.

use crate::error::{PipelineError, PipelineResult};
use std::env;

pub const HANDOFF_CAPACITY_ENV: &str = "SLUICE_HANDOFF_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// Buffered slots per hand-off point. 0 means unbuffered: a send completes
  /// only once a receiver has taken the message.
  pub handoff_capacity: usize,
  /// Emit a WARN event when a stage is declared with zero workers.
  pub warn_on_zero_workers: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl PipelineConfig {
  pub fn new() -> Self {
    Self {
      handoff_capacity: 0,
      warn_on_zero_workers: true,
    }
  }

  /// Opts into buffered hand-offs with `capacity` slots each.
  pub fn with_handoff_capacity(mut self, capacity: usize) -> Self {
    self.handoff_capacity = capacity;
    self
  }

  pub fn with_zero_worker_warning(mut self, warn: bool) -> Self {
    self.warn_on_zero_workers = warn;
    self
  }

  /// Reads overrides from the environment, falling back to the defaults.
  pub fn from_env() -> PipelineResult<Self> {
    let mut config = Self::new();
    if let Ok(raw) = env::var(HANDOFF_CAPACITY_ENV) {
      let capacity = raw.trim().parse::<usize>().map_err(|e| PipelineError::InvalidConfig {
        key: HANDOFF_CAPACITY_ENV.to_string(),
        value: raw.clone(),
        reason: e.to_string(),
      })?;
      config = config.with_handoff_capacity(capacity);
    }
    tracing::debug!(handoff_capacity = config.handoff_capacity, "Pipeline configuration loaded.");
    Ok(config)
  }
}
