// sluice/src/pipeline/aggregate.rs

//! The error aggregator task: drains the shared error-report conduit for the
//! whole run and delivers one terminal result.

use crate::error::{AggregateError, PipelineError, PipelineResult};
use async_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{event, Level};

pub(crate) async fn aggregate(
  errors: Receiver<PipelineError>,
  interrupted: Arc<AtomicBool>,
  outcome: oneshot::Sender<PipelineResult<()>>,
) {
  let mut collected = Vec::new();
  while let Ok(err) = errors.recv().await {
    event!(Level::DEBUG, error = %err, "Error reported.");
    collected.push(err);
  }
  // Workers record cancellation on a flag rather than the conduit, so it is
  // reported once however many of them observed it.
  if interrupted.load(Ordering::SeqCst) {
    collected.push(PipelineError::Cancelled);
  }

  event!(Level::DEBUG, error_count = collected.len(), "Error-report conduit closed; delivering outcome.");
  if outcome.send(AggregateError::into_result(collected)).is_err() {
    event!(Level::DEBUG, "Outcome receiver dropped before the terminal result was delivered.");
  }
}
