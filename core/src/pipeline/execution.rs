// sluice/src/pipeline/execution.rs

//! Contains `Pipeline::run()`, the orchestrator that starts every stage, drains
//! the final hand-off point into the caller's collector and hands back the
//! pipeline's input, its terminal outcome and a completion join.

use crate::core::handoff::{HandoffReceiver, Input};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::definition::Pipeline;
use crate::pipeline::pool::{panic_message, report, supervise, StageWiring};
use async_channel::Sender;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{event, instrument, span, Instrument, Level};

/// A started pipeline.
///
/// `input` is `None` only when no stage was declared; `outcome` then resolves
/// to `PipelineError::EmptyPipeline` straight away.
pub struct Running<M> {
  pub input: Option<Input<M>>,
  pub outcome: Outcome,
  pub completion: Completion,
}

/// The terminal result of a run, delivered exactly once after the last error
/// report has been aggregated.
#[derive(Debug)]
pub struct Outcome {
  rx: oneshot::Receiver<PipelineResult<()>>,
}

impl Outcome {
  fn ready(result: PipelineResult<()>) -> Self {
    let (tx, rx) = oneshot::channel();
    // The receiver is alive right here, so this cannot fail.
    let _ = tx.send(result);
    Self { rx }
  }
}

impl Future for Outcome {
  type Output = PipelineResult<()>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.rx).poll(cx).map(|delivered| {
      delivered.unwrap_or_else(|_| {
        Err(PipelineError::Internal(
          "error aggregator stopped without delivering an outcome".to_string(),
        ))
      })
    })
  }
}

/// Join point for every task of a run: stage supervisors (and through them
/// their workers), the result drain and the error aggregator.
#[derive(Debug, Clone)]
pub struct Completion {
  tracker: TaskTracker,
}

impl Completion {
  pub async fn wait(&self) {
    self.tracker.wait().await;
  }

  pub fn is_finished(&self) -> bool {
    self.tracker.is_closed() && self.tracker.is_empty()
  }
}

impl<M: Send + 'static> Pipeline<M> {
  /// Starts the pipeline. Must be called from within a Tokio runtime.
  ///
  /// `collector` is invoked once per message leaving the last stage, from a
  /// single task, so it never runs concurrently with itself.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      message_type = %std::any::type_name::<M>(),
      num_stages = self.stages.len(),
    )
  )]
  pub fn run<C>(self, collector: C) -> Running<M>
  where
    C: FnMut(M) + Send + 'static,
  {
    let tracker = TaskTracker::new();

    if self.stages.is_empty() {
      event!(Level::WARN, "Empty pipeline cannot run.");
      tracker.close();
      return Running {
        input: None,
        outcome: Outcome::ready(Err(PipelineError::EmptyPipeline)),
        completion: Completion { tracker },
      };
    }

    let Pipeline {
      source,
      stages,
      error_tx,
      error_rx,
      token,
      config,
    } = self;
    let interrupted = Arc::new(AtomicBool::new(false));
    let input = Input::new(source.tx, token.clone());

    let mut stage_input = source.rx;
    let mut upstream: Option<JoinHandle<()>> = None;
    for (def, output) in stages {
      if def.workers == 0 && config.warn_on_zero_workers {
        event!(
          Level::WARN,
          stage_index = def.index,
          "Stage has zero workers; it will process nothing and close its output immediately."
        );
      }
      let wiring = StageWiring {
        input: stage_input,
        output: output.tx,
        errors: error_tx.clone(),
        token: token.clone(),
        interrupted: Arc::clone(&interrupted),
      };
      let supervisor_span = span!(Level::DEBUG, "stage_supervisor", stage_index = def.index);
      upstream = Some(tracker.spawn(supervise(def, wiring, upstream.take()).instrument(supervisor_span)));
      stage_input = output.rx;
    }

    let (outcome_tx, outcome_rx) = oneshot::channel();
    tracker.spawn(
      drain_results(stage_input, collector, upstream, error_tx).instrument(span!(Level::DEBUG, "result_drain")),
    );
    tracker.spawn(aggregate(error_rx, interrupted, outcome_tx).instrument(span!(Level::DEBUG, "error_aggregator")));
    tracker.close();
    event!(Level::DEBUG, "Pipeline started.");

    Running {
      input: Some(input),
      outcome: Outcome { rx: outcome_rx },
      completion: Completion { tracker },
    }
  }
}

/// Feeds the final hand-off point into the collector, then closes the
/// error-report conduit once the last stage (and so every stage) has shut down.
async fn drain_results<M, C>(
  results: HandoffReceiver<M>,
  mut collector: C,
  last_stage: Option<JoinHandle<()>>,
  errors: Sender<PipelineError>,
) where
  M: Send + 'static,
  C: FnMut(M) + Send + 'static,
{
  let mut delivered: u64 = 0;
  let mut collector_failed = false;
  while let Some(msg) = results.recv().await {
    // Keep draining after a collector panic so upstream stages can finish.
    if collector_failed {
      continue;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| collector(msg))) {
      Ok(()) => delivered += 1,
      Err(payload) => {
        collector_failed = true;
        let message = panic_message(payload);
        event!(Level::ERROR, %message, "Result collector panicked; remaining results are discarded.");
        report(&errors, PipelineError::CollectorPanicked { message }).await;
      }
    }
  }

  if let Some(last_stage) = last_stage {
    if let Err(join_err) = last_stage.await {
      report(
        &errors,
        PipelineError::Internal(format!("last stage supervisor failed: {}", join_err)),
      )
      .await;
    }
  }

  errors.close();
  event!(Level::DEBUG, delivered, "Results drained; error-report conduit closed.");
}
