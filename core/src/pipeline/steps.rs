// sluice/src/pipeline/steps.rs

//! Contains the methods that declare stages on a `Pipeline<M>`.
//!
//! Each call records one stage with `workers` parallel workers and appends its
//! output hand-off point. Stages run in declaration order. Caller step errors
//! may be any type convertible into `anyhow::Error`; they are reported as
//! `PipelineError::StepFailed` and never stop the pipeline.
//!
//! A worker count of zero is accepted: the stage processes nothing and its
//! output closes as soon as the stage is started.

use crate::core::handoff::Emitter;
use crate::core::step::{FnProducer, FnTransform, Producer, ProducerFn, StepKind, Transform, TransformFn};
use crate::pipeline::definition::Pipeline;
use std::future::Future;
use std::sync::Arc;

impl<M: Send + 'static> Pipeline<M> {
  /// Declares a synchronous transform stage: one output per successful input.
  pub fn add_step<UserProvidedErr>(
    &mut self,
    workers: usize,
    step_fn: impl Fn(M) -> Result<M, UserProvidedErr> + Send + Sync + 'static,
  ) -> &mut Self
  where
    UserProvidedErr: Into<anyhow::Error> + Send + Sync + 'static,
  {
    let wrapped: TransformFn<M> = Box::new(move |msg| {
      let result = step_fn(msg).map_err(Into::<anyhow::Error>::into);
      Box::pin(async move { result })
    });
    self.push_stage(workers, StepKind::Transform(Arc::new(FnTransform(wrapped))))
  }

  /// Declares an asynchronous transform stage.
  pub fn add_async_step<F, UserProvidedErr>(
    &mut self,
    workers: usize,
    step_fn: impl Fn(M) -> F + Send + Sync + 'static,
  ) -> &mut Self
  where
    F: Future<Output = Result<M, UserProvidedErr>> + Send + 'static,
    UserProvidedErr: Into<anyhow::Error> + Send + Sync + 'static,
  {
    let wrapped: TransformFn<M> = Box::new(move |msg| {
      let user_fut = step_fn(msg);
      Box::pin(async move { user_fut.await.map_err(Into::<anyhow::Error>::into) })
    });
    self.push_stage(workers, StepKind::Transform(Arc::new(FnTransform(wrapped))))
  }

  /// Declares a producer stage: the step writes zero or more outputs per input
  /// through the `Emitter` it is given.
  pub fn add_producer_step<F, UserProvidedErr>(
    &mut self,
    workers: usize,
    step_fn: impl Fn(M, Emitter<M>) -> F + Send + Sync + 'static,
  ) -> &mut Self
  where
    F: Future<Output = Result<(), UserProvidedErr>> + Send + 'static,
    UserProvidedErr: Into<anyhow::Error> + Send + Sync + 'static,
  {
    let wrapped: ProducerFn<M> = Box::new(move |msg, out| {
      let user_fut = step_fn(msg, out);
      Box::pin(async move { user_fut.await.map_err(Into::<anyhow::Error>::into) })
    });
    self.push_stage(workers, StepKind::Producer(Arc::new(FnProducer(wrapped))))
  }

  /// Declares a transform stage backed by a `Transform` implementation shared by all its workers.
  pub fn add_transform(&mut self, workers: usize, transform: impl Transform<M> + 'static) -> &mut Self {
    self.push_stage(workers, StepKind::Transform(Arc::new(transform)))
  }

  /// Declares a producer stage backed by a `Producer` implementation shared by all its workers.
  pub fn add_producer(&mut self, workers: usize, producer: impl Producer<M> + 'static) -> &mut Self {
    self.push_stage(workers, StepKind::Producer(Arc::new(producer)))
  }
}
