// sluice/examples/error_handling.rs

use sluice::{CancellationToken, Collected, Pipeline, PipelineError};
use tracing::{error, info};

// 1. Define a custom application error type
#[derive(Debug, thiserror::Error)]
enum ExampleAppError {
  #[error("cannot parse '{0}' as a number")]
  NotANumber(String),

  #[error("{0} is negative")]
  Negative(i64),
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Error Handling Example ---");

  let mut pipeline = Pipeline::<String>::new(CancellationToken::new());
  pipeline
    .add_step(2, |raw: String| {
      raw
        .trim()
        .parse::<i64>()
        .map(|n| n.to_string())
        .map_err(|_| ExampleAppError::NotANumber(raw.clone()))
    })
    .add_step(1, |n: String| {
      // The first stage only lets numbers through.
      let value: i64 = n.parse().unwrap_or_default();
      if value < 0 {
        Err(ExampleAppError::Negative(value))
      } else {
        Ok(n)
      }
    });

  let accepted = Collected::new();
  let running = pipeline.run(accepted.sink());
  if let Some(input) = &running.input {
    for raw in ["12", "x7", "-3", "40", ""] {
      if let Err(e) = input.send(raw.to_string()).await {
        error!("Could not feed '{}': {}", raw, e);
      }
    }
    input.close();
  }
  running.completion.wait().await;

  info!("Accepted: {:?}", accepted.take());
  match running.outcome.await {
    Ok(()) => info!("No errors."),
    Err(PipelineError::Aggregate(agg)) => {
      error!("{} messages were rejected:", agg.len());
      for err in agg.errors() {
        error!("  {}", err);
      }
    }
    Err(other) => error!("Pipeline failed: {}", other),
  }
  info!("--- Error Handling Example Finished ---");
}
