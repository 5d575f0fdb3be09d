// sluice/src/pipeline/definition.rs

//! Contains the `Pipeline<M>` struct definition and its construction.
//! Stage declaration lives in `steps.rs`, execution in `execution.rs`.

use crate::config::PipelineConfig;
use crate::core::handoff::HandoffPoint;
use crate::core::step::{StageDef, StepKind};
use crate::error::PipelineError;
use async_channel::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

/// A linear pipeline of stages over a single message type `M`.
///
/// Hand-off points are laid out as `[H0, H1, .., Hk]` for `k` declared stages:
/// `H0` is the external input, `Hi` is stage `i-1`'s output and stage `i`'s
/// input, `Hk` feeds the result collector. `H0` exists from construction, every
/// declared stage appends exactly one more.
pub struct Pipeline<M: Send + 'static> {
  /// `H0`, the pipeline's external input.
  pub(crate) source: HandoffPoint<M>,
  /// Declared stages, each paired with its output hand-off point.
  pub(crate) stages: Vec<(StageDef<M>, HandoffPoint<M>)>,

  // Error-report conduit shared by every worker of every stage.
  pub(crate) error_tx: Sender<PipelineError>,
  pub(crate) error_rx: Receiver<PipelineError>,

  pub(crate) token: CancellationToken,
  pub(crate) config: PipelineConfig,
}

impl<M: Send + 'static> Pipeline<M> {
  /// Creates an empty pipeline bound to `token`.
  ///
  /// Cancelling the token stops every worker at its next hand-off send or receive.
  pub fn new(token: CancellationToken) -> Self {
    Self::with_config(token, PipelineConfig::default())
  }

  pub fn with_config(token: CancellationToken, config: PipelineConfig) -> Self {
    let (error_tx, error_rx) = async_channel::unbounded();
    Self {
      source: HandoffPoint::new(config.handoff_capacity),
      stages: Vec::new(),
      error_tx,
      error_rx,
      token,
      config,
    }
  }

  /// Appends a stage and its output hand-off point.
  pub(crate) fn push_stage(&mut self, workers: usize, step: StepKind<M>) -> &mut Self {
    let index = self.stages.len();
    let def = StageDef { index, workers, step };
    event!(Level::DEBUG, stage_index = index, workers, ?def, "Stage declared.");
    self.stages.push((def, HandoffPoint::new(self.config.handoff_capacity)));
    self
  }

  pub fn stage_count(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// Number of hand-off points, always `stage_count() + 1`.
  pub fn handoff_count(&self) -> usize {
    self.stages.len() + 1
  }

  /// Worker counts of the declared stages, in order.
  pub fn worker_counts(&self) -> Vec<usize> {
    self.stages.iter().map(|(def, _)| def.workers).collect()
  }

  /// The token this pipeline observes. Steps may clone it to cut long work short.
  pub fn cancellation_token(&self) -> &CancellationToken {
    &self.token
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }
}

impl<M: Send + 'static> Default for Pipeline<M> {
  fn default() -> Self {
    Self::new(CancellationToken::new())
  }
}
