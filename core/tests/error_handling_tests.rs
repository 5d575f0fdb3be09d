// tests/error_handling_tests.rs
mod common;
use common::*;
use sluice::{CancellationToken, Collected, Emitter, Pipeline, PipelineConfig, PipelineError, Running};
use std::time::Duration;

#[tokio::test]
async fn test_empty_pipeline_reports_empty_error() {
  setup_tracing();
  let pipeline = Pipeline::<()>::new(CancellationToken::new());
  assert!(pipeline.is_empty());
  assert_eq!(pipeline.handoff_count(), 1);

  let Running {
    input,
    outcome,
    completion,
  } = pipeline.run(|_| panic!("collector must not run for an empty pipeline"));

  assert!(input.is_none(), "Running an empty pipeline should not return an input");
  match outcome.await {
    Err(PipelineError::EmptyPipeline) => {}
    other => panic!("Should have gotten the empty pipeline error, got {:?}", other),
  }
  completion.wait().await;
  assert!(completion.is_finished());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_message_is_dropped_and_reported() {
  setup_tracing();
  let mut pipeline = Pipeline::<String>::new(CancellationToken::new());
  pipeline
    .add_step(2, |s: String| Ok::<_, TestError>(s))
    .add_step(1, |s: String| {
      if s.is_empty() {
        Err(TestError::Step("empty string".to_string()))
      } else {
        Ok(s)
      }
    });

  let results = Collected::new();
  let Running {
    input,
    outcome,
    completion,
  } = pipeline.run(results.sink());
  feed(
    &input.unwrap(),
    vec!["".to_string(), "works".to_string(), "also works".to_string()],
  )
  .await
  .unwrap();
  completion.wait().await;

  let mut collected = results.take();
  collected.sort();
  assert_eq!(collected, vec!["also works".to_string(), "works".to_string()]);

  let err = outcome.await.expect_err("Didn't get expected error back from pipeline");
  assert!(err.to_string().contains("empty string"));
  match &err.errors()[..] {
    [PipelineError::StepFailed { stage, source }] => {
      assert_eq!(*stage, 1);
      assert_eq!(
        source.downcast_ref::<TestError>(),
        Some(&TestError::Step("empty string".to_string()))
      );
    }
    other => panic!("Expected a single StepFailed, got {:?}", other),
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_reported_error_is_aggregated() {
  setup_tracing();
  let mut pipeline = Pipeline::<i64>::default();
  pipeline
    .add_step(3, |m: i64| {
      if m % 5 == 0 {
        Err(TestError::Step(format!("stage0 rejects {}", m)))
      } else {
        Ok(m)
      }
    })
    .add_step(2, |m: i64| {
      if m % 7 == 0 {
        Err(anyhow::anyhow!("stage1 rejects {}", m))
      } else {
        Ok(m)
      }
    });

  let results = Collected::new();
  let running = pipeline.run(results.sink());
  feed(running.input.as_ref().unwrap(), 1..=20).await.unwrap();
  running.completion.wait().await;

  let mut collected = results.take();
  collected.sort();
  let expected: Vec<i64> = (1..=20).filter(|m| m % 5 != 0 && m % 7 != 0).collect();
  assert_eq!(collected, expected);

  let err = running.outcome.await.unwrap_err();
  let text = err.to_string();
  assert!(text.starts_with("6 errors occurred:"), "unexpected text: {}", text);
  for rejected in ["stage0 rejects 5", "stage0 rejects 10", "stage0 rejects 15", "stage0 rejects 20"] {
    assert!(text.contains(rejected), "missing '{}' in: {}", rejected, text);
  }
  for rejected in ["stage1 rejects 7", "stage1 rejects 14"] {
    assert!(text.contains(rejected), "missing '{}' in: {}", rejected, text);
  }
  assert_eq!(error_messages(&err).len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_producer_error_keeps_already_emitted_outputs() {
  setup_tracing();
  let mut pipeline = Pipeline::<i64>::default();
  pipeline.add_producer_step(2, |m: i64, out: Emitter<i64>| async move {
    out.emit(m).await.map_err(|e| TestError::Producer(e.to_string()))?;
    if m % 2 == 1 {
      return Err(TestError::Producer(format!("odd {}", m)));
    }
    Ok::<(), TestError>(())
  });

  let results = Collected::new();
  let running = pipeline.run(results.sink());
  feed(running.input.as_ref().unwrap(), 1..=4).await.unwrap();
  running.completion.wait().await;

  let mut collected = results.take();
  collected.sort();
  assert_eq!(collected, vec![1, 2, 3, 4]);

  let err = running.outcome.await.unwrap_err();
  let messages = error_messages(&err);
  assert_eq!(messages.len(), 2);
  assert!(messages.iter().any(|m| m.contains("odd 1")));
  assert!(messages.iter().any(|m| m.contains("odd 3")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_panic_is_reported_and_other_workers_continue() {
  setup_tracing();
  let mut pipeline = Pipeline::<i64>::default();
  pipeline.add_step(3, |m: i64| {
    if m == 7 {
      panic!("boom on seven");
    }
    Ok::<_, TestError>(m)
  });

  let results = Collected::new();
  let running = pipeline.run(results.sink());
  feed(running.input.as_ref().unwrap(), 0..20).await.unwrap();
  running.completion.wait().await;

  let mut collected = results.take();
  collected.sort();
  let expected: Vec<i64> = (0..20).filter(|m| *m != 7).collect();
  assert_eq!(collected, expected);

  let err = running.outcome.await.unwrap_err();
  match &err.errors()[..] {
    [PipelineError::WorkerPanicked { stage, message, .. }] => {
      assert_eq!(*stage, 0);
      assert!(message.contains("boom on seven"));
    }
    other => panic!("Expected a single WorkerPanicked, got {:?}", other),
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_collector_panic_is_reported_and_pipeline_still_drains() {
  setup_tracing();
  let mut pipeline = Pipeline::<i64>::default();
  pipeline.add_step(2, |m: i64| Ok::<_, TestError>(m));

  let running = pipeline.run(|_m: i64| panic!("collector failure"));
  feed(running.input.as_ref().unwrap(), 0..10).await.unwrap();
  tokio::time::timeout(Duration::from_secs(5), running.completion.wait())
    .await
    .expect("pipeline should drain after a collector panic");

  let err = running.outcome.await.unwrap_err();
  match &err.errors()[..] {
    [PipelineError::CollectorPanicked { message }] => assert!(message.contains("collector failure")),
    other => panic!("Expected a single CollectorPanicked, got {:?}", other),
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_zero_worker_stage_closes_without_deadlock() {
  setup_tracing();
  let config = PipelineConfig::new().with_zero_worker_warning(false);
  let mut pipeline = Pipeline::<i64>::with_config(CancellationToken::new(), config);
  pipeline
    .add_step(2, |m: i64| Ok::<_, TestError>(m))
    .add_step(0, |m: i64| Ok::<_, TestError>(m))
    .add_step(1, |m: i64| Ok::<_, TestError>(m));
  assert_eq!(pipeline.worker_counts(), vec![2, 0, 1]);

  let results = Collected::new();
  let Running {
    input,
    outcome,
    completion,
  } = pipeline.run(results.sink());
  let input = input.unwrap();
  for m in 0..5 {
    // Once the first stage gives up, its input has no receivers left.
    if let Err(err) = input.send(m).await {
      assert!(matches!(err, PipelineError::InputClosed));
      break;
    }
  }
  input.close();

  tokio::time::timeout(Duration::from_secs(5), completion.wait())
    .await
    .expect("a zero-worker stage must not deadlock the pipeline");
  assert!(results.is_empty());

  let err = outcome.await.unwrap_err();
  assert!(err
    .errors()
    .iter()
    .all(|e| matches!(e, PipelineError::DownstreamClosed { stage: 0 })));
  assert!(!err.errors().is_empty());
}
