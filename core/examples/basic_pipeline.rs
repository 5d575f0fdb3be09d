// sluice/examples/basic_pipeline.rs

use sluice::{CancellationToken, Collected, Pipeline, PipelineError, Running};
use tracing::info;

// 1. Define the message type that flows through every stage
#[derive(Clone, Debug, Default)]
struct Square {
  i: i64,
  res: i64,
}

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 2. Declare the stages in order: worker count, then the step
  let mut pipeline = Pipeline::<Square>::new(CancellationToken::new());
  pipeline
    .add_step(2, |mut m: Square| {
      m.res = m.i * m.i;
      Ok::<_, PipelineError>(m)
    })
    .add_step(1, |mut m: Square| {
      m.res += m.res;
      Ok::<_, PipelineError>(m)
    })
    .add_step(10, |mut m: Square| {
      m.res += m.i;
      Ok::<_, PipelineError>(m)
    });

  // 3. Run it, collecting results into a shared buffer
  let results = Collected::new();
  let Running {
    input,
    outcome,
    completion,
  } = pipeline.run(results.sink());
  let input = input.ok_or(PipelineError::EmptyPipeline)?;

  // 4. Feed it and signal end-of-input
  for i in 1..=3 {
    input.send(Square { i, res: 0 }).await?;
  }
  input.close();

  // 5. Wait for everything to drain
  completion.wait().await;
  outcome.await?;

  for m in results.take() {
    info!("{} -> {}", m.i, m.res);
  }
  info!("--- Basic Pipeline Example Finished ---");
  Ok(())
}
