// sluice/src/pipeline/pool.rs

//! The stage worker pool: N workers over one step, plus the supervising task
//! that owns them and closes the stage's output hand-off point.
//!
//! Shutdown cascades strictly downstream. A supervisor closes its output only
//! after (1) all of its own workers have returned and (2) the upstream stage's
//! supervisor has returned. In a normal drain (2) already holds when (1) does;
//! under cancellation it keeps an early-finishing downstream stage from letting
//! the collector close the error conduit while an upstream worker can still report.

use crate::core::handoff::{Emitter, Halt, HandoffReceiver, HandoffSender};
use crate::core::step::{StageDef, StepKind};
use crate::error::PipelineError;
use async_channel::Sender;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{event, span, Instrument, Level};

/// Everything a stage needs from its surroundings.
pub(crate) struct StageWiring<M> {
  pub(crate) input: HandoffReceiver<M>,
  pub(crate) output: HandoffSender<M>,
  pub(crate) errors: Sender<PipelineError>,
  pub(crate) token: CancellationToken,
  /// Set once any worker stops because of cancellation.
  pub(crate) interrupted: Arc<AtomicBool>,
}

/// Starts the stage's workers, waits for them, releases the stage's input,
/// waits for the upstream stage, then closes the stage's output.
pub(crate) async fn supervise<M: Send + 'static>(
  stage: StageDef<M>,
  wiring: StageWiring<M>,
  upstream: Option<JoinHandle<()>>,
) {
  let StageWiring {
    input,
    output,
    errors,
    token,
    interrupted,
  } = wiring;

  let mut handles = Vec::with_capacity(stage.workers);
  for worker_index in 0..stage.workers {
    let worker = Worker {
      stage: stage.index,
      step: stage.step.clone(),
      input: input.clone(),
      emitter: Emitter::new(output.clone(), token.clone(), stage.index),
      errors: errors.clone(),
      token: token.clone(),
      interrupted: Arc::clone(&interrupted),
    };
    let worker_span = span!(Level::DEBUG, "stage_worker", stage_index = stage.index, worker_index);
    handles.push((worker_index, tokio::spawn(worker.run().instrument(worker_span))));
  }
  event!(Level::DEBUG, workers = stage.workers, "Stage workers started.");

  for (worker_index, handle) in handles {
    if let Err(join_err) = handle.await {
      let message = if join_err.is_panic() {
        panic_message(join_err.into_panic())
      } else {
        "worker task was cancelled".to_string()
      };
      event!(Level::ERROR, worker_index, %message, "Stage worker panicked.");
      report(
        &errors,
        PipelineError::WorkerPanicked {
          stage: stage.index,
          worker: worker_index,
          message,
        },
      )
      .await;
    }
  }

  // No worker will read the input again. Refuse further sends and release any
  // sender still parked on a queued message, so the upstream stage can stop.
  let discarded = input.close_and_discard();
  if discarded > 0 {
    event!(Level::DEBUG, discarded, "Stage input closed with messages still queued.");
  }

  if let Some(upstream) = upstream {
    if let Err(join_err) = upstream.await {
      report(
        &errors,
        PipelineError::Internal(format!("supervisor upstream of stage {} failed: {}", stage.index, join_err)),
      )
      .await;
    }
  }

  output.close();
  event!(Level::DEBUG, "All stage workers finished; output hand-off closed.");
}

struct Worker<M: Send + 'static> {
  stage: usize,
  step: StepKind<M>,
  input: HandoffReceiver<M>,
  emitter: Emitter<M>,
  errors: Sender<PipelineError>,
  token: CancellationToken,
  interrupted: Arc<AtomicBool>,
}

impl<M: Send + 'static> Worker<M> {
  async fn run(self) {
    let mut processed: u64 = 0;
    loop {
      let msg = tokio::select! {
        biased;
        _ = self.token.cancelled() => {
          self.interrupted.store(true, Ordering::SeqCst);
          event!(Level::DEBUG, "Worker observed cancellation while waiting for input.");
          break;
        }
        received = self.input.recv() => match received {
          Some(msg) => msg,
          // Closed and drained.
          None => break,
        },
      };
      event!(Level::TRACE, "Message received.");

      let step_result = match &self.step {
        StepKind::Transform(transform) => match transform.transform(msg).await {
          Ok(output) => {
            // A refused send is recorded on the emitter and handled below.
            let _ = self.emitter.emit(output).await;
            Ok(())
          }
          Err(source) => Err(source),
        },
        StepKind::Producer(producer) => producer.produce(msg, self.emitter.clone()).await,
      };
      processed += 1;

      if let Err(source) = step_result {
        if !is_halt_error(&source) {
          event!(Level::WARN, error = %source, "Step failed; message dropped.");
          report(&self.errors, PipelineError::step_failed(self.stage, source)).await;
        }
      }

      match self.emitter.halted() {
        None => {}
        Some(Halt::Cancelled) => {
          self.interrupted.store(true, Ordering::SeqCst);
          event!(Level::DEBUG, "Worker observed cancellation while handing off output.");
          break;
        }
        Some(Halt::DownstreamClosed) => {
          event!(Level::WARN, "Downstream hand-off point closed; worker stopping.");
          report(&self.errors, PipelineError::DownstreamClosed { stage: self.stage }).await;
          break;
        }
      }
    }
    event!(Level::DEBUG, processed, "Worker exiting.");
  }
}

/// Errors produced by a refused `Emitter::emit` and propagated by the step with `?`.
/// The halt itself is reported by the worker, so the step's copy is not.
fn is_halt_error(err: &anyhow::Error) -> bool {
  matches!(
    err.downcast_ref::<PipelineError>(),
    Some(PipelineError::Cancelled) | Some(PipelineError::DownstreamClosed { .. })
  )
}

/// Sends one report to the aggregator. The conduit closes only after every
/// stage has finished, so a failure here means the orchestrator is gone.
pub(crate) async fn report(errors: &Sender<PipelineError>, err: PipelineError) {
  if let Err(async_channel::SendError(lost)) = errors.send(err).await {
    event!(Level::ERROR, error = %lost, "Error-report conduit closed; error dropped.");
  }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
