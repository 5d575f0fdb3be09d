// sluice/src/error.rs
use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Empty pipeline cannot run")]
  EmptyPipeline,

  #[error("Step failed in stage {stage}: {source}")]
  StepFailed {
    stage: usize,
    #[source]
    source: AnyhowError,
  },

  #[error("Worker {worker} of stage {stage} panicked: {message}")]
  WorkerPanicked { stage: usize, worker: usize, message: String },

  #[error("Result collector panicked: {message}")]
  CollectorPanicked { message: String },

  /// The stage tried to hand off a message but every downstream receiver is gone.
  #[error("Stage {stage} could not hand off a message: downstream hand-off point is closed")]
  DownstreamClosed { stage: usize },

  /// A configuration value supplied by the caller (or its environment) was rejected.
  #[error("Invalid configuration {key}='{value}': {reason}")]
  InvalidConfig { key: String, value: String, reason: String },

  #[error("Pipeline input is closed")]
  InputClosed,

  #[error("Pipeline was cancelled before all messages were processed")]
  Cancelled,

  #[error(transparent)]
  Aggregate(#[from] AggregateError),

  #[error("Internal sluice error: {0}")]
  Internal(String),
}

impl PipelineError {
  /// Wraps a caller-supplied step failure, keeping the stage it came from.
  pub(crate) fn step_failed(stage: usize, source: impl Into<AnyhowError>) -> Self {
    PipelineError::StepFailed {
      stage,
      source: source.into(),
    }
  }

  /// The individual errors behind this value: the aggregate's members, or itself.
  pub fn errors(&self) -> &[PipelineError] {
    match self {
      PipelineError::Aggregate(agg) => agg.errors(),
      other => std::slice::from_ref(other),
    }
  }
}

/// Every error reported during one run, in arrival order.
///
/// Rendered like a multi-error list so that each individual message survives
/// in the text of the terminal error.
#[derive(Debug)]
pub struct AggregateError {
  errors: Vec<PipelineError>,
}

impl AggregateError {
  pub(crate) fn new(errors: Vec<PipelineError>) -> Self {
    Self { errors }
  }

  /// `Ok(())` when nothing was reported, otherwise the combined error.
  pub(crate) fn into_result(errors: Vec<PipelineError>) -> PipelineResult<()> {
    if errors.is_empty() {
      Ok(())
    } else {
      Err(PipelineError::Aggregate(AggregateError::new(errors)))
    }
  }

  pub fn errors(&self) -> &[PipelineError] {
    &self.errors
  }

  pub fn len(&self) -> usize {
    self.errors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn into_errors(self) -> Vec<PipelineError> {
    self.errors
  }
}

impl fmt::Display for AggregateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let noun = if self.errors.len() == 1 { "error" } else { "errors" };
    writeln!(f, "{} {} occurred:", self.errors.len(), noun)?;
    for err in &self.errors {
      writeln!(f, "\t* {}", err)?;
    }
    Ok(())
  }
}

impl std::error::Error for AggregateError {}

pub type PipelineResult<T, E = PipelineError> = std::result::Result<T, E>;
