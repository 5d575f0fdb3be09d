// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every helper

use once_cell::sync::Lazy;
use sluice::{Input, PipelineError};
use tracing::Level;

// --- Common Message Structs ---
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Msg {
  pub i: i64,
  pub res: i64,
  pub expected: i64,
}

impl Msg {
  pub fn new(i: i64, expected: i64) -> Self {
    Msg { i, res: 0, expected }
  }
}

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Test step failed: {0}")]
  Step(String),

  #[error("Test producer failed: {0}")]
  Producer(String),
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Sends every item, then closes the input.
pub async fn feed<M: Send>(input: &Input<M>, items: impl IntoIterator<Item = M>) -> Result<(), PipelineError> {
  for item in items {
    input.send(item).await?;
  }
  input.close();
  Ok(())
}

/// The display text of every individual error behind a terminal result.
pub fn error_messages(err: &PipelineError) -> Vec<String> {
  err.errors().iter().map(|e| e.to_string()).collect()
}
