//! # Data Brancher Test Suite

use crate::brancher::DataBrancher;
use crate::buffer::BufferState;
use crate::completion::CompletionStatus;
use crate::dataflow::GraphNode;
use crate::error::FlowError;
use crate::node::NodeExecutionError;
use crate::options::DataflowOptions;
use crate::worker::{copy_fn, try_copy_fn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn options(name: &str) -> DataflowOptions {
  DataflowOptions::new().with_name(name)
}

#[tokio::test]
async fn test_brancher_ports_and_names() {
  let brancher = DataBrancher::<i32>::new(options("tee"));
  assert_eq!(brancher.name(), "tee");
  assert_eq!(brancher.input().name(), "tee.tee.input");
  assert_eq!(brancher.output().name(), "tee.tee.output");
  assert_eq!(brancher.copied_output().name(), "tee.copy");
  assert_eq!(brancher.copied_output().capacity(), usize::MAX);
  assert!(brancher.options().propagate_completion);
}

#[tokio::test]
async fn test_default_name() {
  let brancher = DataBrancher::<i32>::new(DataflowOptions::default());
  assert_eq!(brancher.name(), "DataBrancher");
}

#[tokio::test]
async fn test_default_brancher() {
  let brancher = DataBrancher::<i32>::default();
  assert_eq!(brancher.name(), "DataBrancher");
  assert_eq!(brancher.copied_output().capacity(), usize::MAX);
  assert_eq!(brancher.options().max_degree_of_parallelism, 1);

  brancher.input().send(9).await.unwrap();
  brancher.complete();
  assert_eq!(brancher.output().recv().await, Some(9));
  assert_eq!(brancher.copied_output().recv().await, Some(9));
  assert_eq!(
    brancher.wait_completion().await,
    CompletionStatus::RanToCompletion
  );
}

#[tokio::test]
async fn test_no_loss_while_open() {
  let brancher = DataBrancher::with_copy_fn(
    copy_fn(|s: &String| s.to_uppercase()),
    options("tee").with_recommended_capacity(4),
  );

  let input = brancher.input();
  let producer = tokio::spawn(async move {
    for i in 0..100 {
      input.send(format!("item-{i}")).await.unwrap();
    }
    input.complete();
  });

  let output = brancher.output();
  let primary = tokio::spawn(async move {
    let mut items = Vec::new();
    while let Some(item) = output.recv().await {
      items.push(item);
    }
    items
  });

  let copies = brancher.copied_output();
  let secondary = tokio::spawn(async move {
    let mut items = Vec::new();
    while let Some(item) = copies.recv().await {
      tokio::time::sleep(Duration::from_millis(1)).await;
      items.push(item);
    }
    items
  });

  producer.await.unwrap();
  let primary = primary.await.unwrap();
  let secondary = secondary.await.unwrap();

  assert_eq!(primary.len(), 100);
  assert_eq!(secondary.len(), 100);
  for (i, (original, copy)) in primary.iter().zip(&secondary).enumerate() {
    assert_eq!(original, &format!("item-{i}"));
    assert_eq!(copy, &format!("ITEM-{i}"));
  }
  assert_eq!(
    brancher.wait_completion().await,
    CompletionStatus::RanToCompletion
  );
}

#[tokio::test]
async fn test_identity_without_copy_function() {
  let brancher = DataBrancher::<Arc<Vec<u8>>>::new(options("tee"));
  let payload = Arc::new(vec![1u8, 2, 3]);

  brancher.input().send(Arc::clone(&payload)).await.unwrap();
  brancher.complete();

  let primary = brancher.output().recv().await.unwrap();
  let secondary = brancher.copied_output().recv().await.unwrap();
  assert_eq!(primary, payload);
  assert!(Arc::ptr_eq(&primary, &secondary));
}

#[tokio::test]
async fn test_copy_function_applied_exactly_once() {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&calls);
  let brancher = DataBrancher::with_copy_fn(
    copy_fn(move |x: &i32| {
      counter.fetch_add(1, Ordering::SeqCst);
      x * 3
    }),
    options("tee"),
  );

  for i in 1..=10 {
    brancher.input().send(i).await.unwrap();
  }
  brancher.complete();

  let mut primary = Vec::new();
  while let Some(item) = brancher.output().recv().await {
    primary.push(item);
  }
  let mut secondary = Vec::new();
  while let Some(item) = brancher.copied_output().recv().await {
    secondary.push(item);
  }

  assert_eq!(primary, (1..=10).collect::<Vec<_>>());
  assert_eq!(secondary, (1..=10).map(|x| x * 3).collect::<Vec<_>>());
  assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_backpressure_suspends_instead_of_dropping() {
  let capacity = 2;
  let brancher = DataBrancher::<i32>::new(options("tee").with_recommended_capacity(capacity));

  let output = brancher.output();
  let input = brancher.input();
  for i in 0..=capacity as i32 {
    input.send(i).await.unwrap();
  }

  // The secondary consumer never reads: C items fit, item C+1 holds the worker.
  for i in 0..capacity as i32 {
    assert_eq!(output.recv().await, Some(i));
  }
  let blocked = tokio::time::timeout(Duration::from_millis(50), output.recv()).await;
  assert!(blocked.is_err());
  assert_eq!(brancher.copied_output().len(), capacity);
  assert_eq!(brancher.copied_output().state(), BufferState::Open);

  // Reading one copy frees space and releases the suspended item.
  assert_eq!(brancher.copied_output().recv().await, Some(0));
  assert_eq!(output.recv().await, Some(capacity as i32));
  assert_eq!(brancher.copied_output().len(), capacity);
}

#[tokio::test]
async fn test_completion_waits_for_secondary_drain() {
  let brancher = DataBrancher::<i32>::new(options("tee"));
  brancher.input().send(1).await.unwrap();
  brancher.complete();

  assert_eq!(brancher.output().recv().await, Some(1));
  assert_eq!(brancher.output().recv().await, None);
  tokio::time::sleep(Duration::from_millis(20)).await;

  assert_eq!(brancher.copied_output().state(), BufferState::Draining);
  assert!(!brancher.completion().is_completed());

  assert_eq!(brancher.copied_output().recv().await, Some(1));
  assert_eq!(
    brancher.wait_completion().await,
    CompletionStatus::RanToCompletion
  );
  assert_eq!(brancher.copied_output().state(), BufferState::Completed);
}

#[tokio::test]
async fn test_copy_failure_faults_node_and_secondary() {
  let brancher = DataBrancher::with_copy_fn(
    try_copy_fn(|x: &i32| {
      if *x < 0 {
        Err(NodeExecutionError::from("negative"))
      } else {
        Ok(*x)
      }
    }),
    options("tee"),
  );

  brancher.input().send(1).await.unwrap();
  brancher.input().send(-1).await.unwrap();

  let status = brancher.wait_completion().await;
  let error = status.error().cloned().unwrap();
  assert!(matches!(error, FlowError::CopyFailed { .. }));

  assert_eq!(brancher.copied_output().state(), BufferState::Faulted);
  assert_eq!(
    brancher.copied_output().completion().wait().await,
    CompletionStatus::Faulted(error)
  );
  assert_eq!(brancher.copied_output().recv().await, None);
}

#[tokio::test]
async fn test_cancel_never_completes_secondary() {
  let brancher = DataBrancher::<i32>::new(options("tee"));
  brancher.input().send(1).await.unwrap();
  assert_eq!(brancher.output().recv().await, Some(1));

  brancher.cancel();
  assert_eq!(brancher.wait_completion().await, CompletionStatus::Canceled);

  let secondary = brancher.copied_output().completion().wait().await;
  assert!(matches!(
    secondary,
    CompletionStatus::Faulted(FlowError::Canceled { .. })
  ));
  assert!(brancher.input().send(2).await.is_err());
}

#[tokio::test]
async fn test_external_fault_reaches_both_branches() {
  let brancher = DataBrancher::<i32>::new(options("tee"));
  brancher.input().send(1).await.unwrap();

  let error = FlowError::faulted("graph", "peer failed");
  brancher.fault(error.clone());

  assert_eq!(
    brancher.wait_completion().await,
    CompletionStatus::Faulted(error)
  );
  assert_eq!(brancher.output().state(), BufferState::Faulted);
  assert_eq!(brancher.copied_output().state(), BufferState::Faulted);
}

#[tokio::test]
async fn test_link_secondary_to_another_brancher() {
  let source = DataBrancher::with_copy_fn(copy_fn(|x: &i32| x + 1), options("source"));
  let sink = DataBrancher::<i32>::new(options("sink"));
  let link = source.link_secondary_to(&sink);

  for i in 0..5 {
    source.input().send(i).await.unwrap();
  }
  source.complete();

  let mut primary = Vec::new();
  while let Some(item) = source.output().recv().await {
    primary.push(item);
  }
  let mut linked = Vec::new();
  while let Some(item) = sink.output().recv().await {
    linked.push(item);
  }
  link.await.unwrap().unwrap();

  assert_eq!(primary, vec![0, 1, 2, 3, 4]);
  assert_eq!(linked, vec![1, 2, 3, 4, 5]);
  assert_eq!(
    source.wait_completion().await,
    CompletionStatus::RanToCompletion
  );
  assert_eq!(sink.copied_output().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_copies_preserve_order() {
  let brancher = DataBrancher::with_copy_fn(
    copy_fn(|x: &u64| {
      std::thread::sleep(Duration::from_micros((64 - x % 64) * 20));
      x + 1000
    }),
    options("tee").with_max_degree_of_parallelism(6),
  );

  let input = brancher.input();
  tokio::spawn(async move {
    for i in 0..64u64 {
      input.send(i).await.unwrap();
    }
    input.complete();
  });

  let mut primary = Vec::new();
  while let Some(item) = brancher.output().recv().await {
    primary.push(item);
  }
  let mut secondary = Vec::new();
  while let Some(item) = brancher.copied_output().recv().await {
    secondary.push(item);
  }

  assert_eq!(primary, (0..64).collect::<Vec<_>>());
  assert_eq!(secondary, (1000..1064).collect::<Vec<_>>());
}
