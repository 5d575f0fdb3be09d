// sluice/examples/producer_fanout.rs

use sluice::{CancellationToken, Collected, Emitter, Pipeline, PipelineError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Producer Fan-out Example ---");

  let mut pipeline = Pipeline::<String>::new(CancellationToken::new());

  // Split each line into words: one input, many outputs.
  pipeline.add_producer_step(2, |line: String, out: Emitter<String>| async move {
    for word in line.split_whitespace() {
      out.emit(word.to_string()).await?;
    }
    Ok::<(), PipelineError>(())
  });
  pipeline.add_step(4, |word: String| Ok::<_, PipelineError>(word.to_uppercase()));

  let words = Collected::new();
  let running = pipeline.run(words.sink());
  if let Some(input) = &running.input {
    input.send("the quick brown fox".to_string()).await?;
    input.send("jumps over the lazy dog".to_string()).await?;
    input.close();
  }
  running.completion.wait().await;
  running.outcome.await?;

  // Multi-worker stages do not preserve order.
  let mut words = words.take();
  words.sort();
  info!("{} words: {:?}", words.len(), words);
  Ok(())
}
