// sluice/examples/cancellation.rs

use sluice::{CancellationToken, Collected, Pipeline, PipelineError};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Cancellation Example ---");

  let token = CancellationToken::new();
  let mut pipeline = Pipeline::<u64>::new(token.clone());
  pipeline.add_async_step(4, |n: u64| async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok::<_, PipelineError>(n * n)
  });

  let results = Collected::new();
  let running = pipeline.run(results.sink());
  let Some(input) = running.input.clone() else {
    return;
  };

  // An endless feeder; only cancellation stops it.
  tokio::spawn(async move {
    let mut n = 0;
    while input.send(n).await.is_ok() {
      n += 1;
    }
  });

  tokio::time::sleep(Duration::from_millis(200)).await;
  info!("Cancelling...");
  token.cancel();

  running.completion.wait().await;
  info!("Processed {} messages before cancellation.", results.len());
  if let Err(e) = running.outcome.await {
    warn!("Outcome: {}", e);
  }
}
