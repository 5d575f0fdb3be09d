// sluice/src/core/step.rs

//! Defines the step abstractions a stage runs and the stage definition recorded
//! by the builder.

use crate::core::handoff::Emitter;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A one-in, one-out step. Returning an error drops the message from the pipeline.
#[async_trait]
pub trait Transform<M: Send + 'static>: Send + Sync {
  async fn transform(&self, msg: M) -> anyhow::Result<M>;
}

/// A one-in, many-out step. Outputs go through `out` as they are produced; an
/// error does not retract outputs already emitted.
#[async_trait]
pub trait Producer<M: Send + 'static>: Send + Sync {
  async fn produce(&self, msg: M, out: Emitter<M>) -> anyhow::Result<()>;
}

pub(crate) type TransformFn<M> = Box<dyn Fn(M) -> BoxFuture<anyhow::Result<M>> + Send + Sync>;
pub(crate) type ProducerFn<M> = Box<dyn Fn(M, Emitter<M>) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Adapts a boxed closure to `Transform`.
pub(crate) struct FnTransform<M>(pub(crate) TransformFn<M>);

#[async_trait]
impl<M: Send + 'static> Transform<M> for FnTransform<M> {
  async fn transform(&self, msg: M) -> anyhow::Result<M> {
    (self.0)(msg).await
  }
}

/// Adapts a boxed closure to `Producer`.
pub(crate) struct FnProducer<M>(pub(crate) ProducerFn<M>);

#[async_trait]
impl<M: Send + 'static> Producer<M> for FnProducer<M> {
  async fn produce(&self, msg: M, out: Emitter<M>) -> anyhow::Result<()> {
    (self.0)(msg, out).await
  }
}

pub(crate) enum StepKind<M: Send + 'static> {
  Transform(Arc<dyn Transform<M>>),
  Producer(Arc<dyn Producer<M>>),
}

impl<M: Send + 'static> Clone for StepKind<M> {
  fn clone(&self) -> Self {
    match self {
      StepKind::Transform(t) => StepKind::Transform(Arc::clone(t)),
      StepKind::Producer(p) => StepKind::Producer(Arc::clone(p)),
    }
  }
}

/// A declared stage: its position, its worker count and the step its workers run.
pub(crate) struct StageDef<M: Send + 'static> {
  pub(crate) index: usize,
  pub(crate) workers: usize,
  pub(crate) step: StepKind<M>,
}

// The step is a trait object, so Debug only reports its kind.
impl<M: Send + 'static> std::fmt::Debug for StageDef<M> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let kind = match self.step {
      StepKind::Transform(_) => "transform",
      StepKind::Producer(_) => "producer",
    };
    f.debug_struct("StageDef")
      .field("index", &self.index)
      .field("workers", &self.workers)
      .field("kind", &kind)
      .finish()
  }
}
