//! # Tee Worker
//!
//! The processing stage of a brancher. For every admitted item the worker:
//!
//! 1. computes the duplicate (`copy(item)` or a clone of the item),
//! 2. `safe_post`s the duplicate into the duplicate buffer, suspending while
//!    it is full,
//! 3. sends the original item to the primary output.
//!
//! Copies of up to `max_degree_of_parallelism` items are computed
//! concurrently, but steps 2 and 3 run strictly in admission order so both
//! branches see the same sequence.
//!
//! When the run ends the [`CompletionCoordinator`] sees the status before
//! anything else happens, then the worker finalizes its own ports and
//! publishes its completion.

use crate::buffer::BufferBlock;
use crate::completion::{Completion, CompletionSource, CompletionStatus};
use crate::coordinator::CompletionCoordinator;
use crate::error::FlowError;
use crate::node::NodeExecutionError;
use crate::options::DataflowOptions;
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Function producing the value placed on the secondary branch.
///
/// It is evaluated at most once per item. An error is fatal to the item and
/// faults the worker; it is never retried.
pub trait CopyFunction<T>: Send + Sync {
  /// Produces the duplicate of `item`.
  fn copy(&self, item: &T) -> Result<T, NodeExecutionError>;
}

impl<T, F> CopyFunction<T> for F
where
  F: Fn(&T) -> Result<T, NodeExecutionError> + Send + Sync,
{
  fn copy(&self, item: &T) -> Result<T, NodeExecutionError> {
    self(item)
  }
}

/// Shared copy function.
pub type CopyConfig<T> = Arc<dyn CopyFunction<T>>;

/// Wraps an infallible closure as a [`CopyConfig`].
///
/// ```rust
/// use streamweave_brancher::worker::{CopyConfig, CopyFunction, copy_fn};
///
/// let negate: CopyConfig<i32> = copy_fn(|x: &i32| -x);
/// assert_eq!(negate.copy(&3).unwrap(), -3);
/// ```
pub fn copy_fn<T, F>(function: F) -> CopyConfig<T>
where
  T: 'static,
  F: Fn(&T) -> T + Send + Sync + 'static,
{
  Arc::new(move |item: &T| Ok::<T, NodeExecutionError>(function(item)))
}

/// Wraps a fallible closure as a [`CopyConfig`].
pub fn try_copy_fn<T, F>(function: F) -> CopyConfig<T>
where
  T: 'static,
  F: Fn(&T) -> Result<T, NodeExecutionError> + Send + Sync + 'static,
{
  Arc::new(function)
}

/// Handle to a running tee worker.
pub struct TeeWorker<T> {
  name: String,
  input: Arc<BufferBlock<T>>,
  output: Arc<BufferBlock<T>>,
  cancel: CancellationToken,
  fault_reason: Arc<Mutex<Option<FlowError>>>,
  completion: Completion,
}

impl<T> TeeWorker<T>
where
  T: Clone + Send + 'static,
{
  /// Creates the worker's ports and spawns its run loop.
  ///
  /// Must be called within a Tokio runtime.
  pub fn spawn(
    name: impl Into<String>,
    options: &DataflowOptions,
    copy: Option<CopyConfig<T>>,
    duplicates: Arc<BufferBlock<T>>,
  ) -> Self {
    let name = name.into();
    let capacity = options.bounded_capacity();
    let input = Arc::new(BufferBlock::new(format!("{name}.input"), capacity));
    let output = Arc::new(BufferBlock::new(format!("{name}.output"), capacity));
    let cancel = CancellationToken::new();
    let fault_reason = Arc::new(Mutex::new(None));
    let source = CompletionSource::new();
    let completion = source.completion();

    let run = TeeRun {
      name: name.clone(),
      input: Arc::clone(&input),
      output: Arc::clone(&output),
      duplicates,
      copy,
      parallelism: options.max_degree_of_parallelism.max(1),
      cancel: cancel.clone(),
      fault_reason: Arc::clone(&fault_reason),
    };
    tokio::spawn(run.drive(source));

    Self {
      name,
      input,
      output,
      cancel,
      fault_reason,
      completion,
    }
  }
}

impl<T> TeeWorker<T> {
  /// Returns the worker name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the input port.
  pub fn input(&self) -> Arc<BufferBlock<T>> {
    Arc::clone(&self.input)
  }

  /// Returns the primary output port.
  pub fn output(&self) -> Arc<BufferBlock<T>> {
    Arc::clone(&self.output)
  }

  /// Returns a handle observing the worker's terminal status.
  pub fn completion(&self) -> Completion {
    self.completion.clone()
  }

  /// Cancels pending work. In-flight items are abandoned.
  pub fn cancel(&self) {
    debug!("TeeWorker::cancel(name={})", self.name);
    self.cancel.cancel();
  }

  /// Faults the worker with `error`. In-flight items are abandoned.
  pub fn fault(&self, error: FlowError) {
    {
      let mut reason = self
        .fault_reason
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
      if reason.is_none() {
        *reason = Some(error.clone());
      }
    }
    self.cancel.cancel();
    self.input.fault(error.clone());
    self.output.fault(error);
  }
}

struct TeeRun<T> {
  name: String,
  input: Arc<BufferBlock<T>>,
  output: Arc<BufferBlock<T>>,
  duplicates: Arc<BufferBlock<T>>,
  copy: Option<CopyConfig<T>>,
  parallelism: usize,
  cancel: CancellationToken,
  fault_reason: Arc<Mutex<Option<FlowError>>>,
}

impl<T> TeeRun<T>
where
  T: Clone + Send + 'static,
{
  async fn drive(self, source: CompletionSource) {
    debug!(
      "TeeWorker(name={}) started, parallelism={}",
      self.name, self.parallelism
    );
    let status = self.process().await;
    CompletionCoordinator::observe(&status, &self.duplicates);

    let status = match status {
      CompletionStatus::RanToCompletion => {
        self.output.complete();
        self.output.completion().wait().await
      }
      CompletionStatus::Faulted(error) => {
        self.input.fault(error.clone());
        self.output.fault(error.clone());
        CompletionStatus::Faulted(error)
      }
      CompletionStatus::Canceled => {
        let error = FlowError::Canceled {
          node: self.name.clone(),
        };
        self.input.fault(error.clone());
        self.output.fault(error);
        CompletionStatus::Canceled
      }
    };

    debug!("TeeWorker(name={}) finished: {:?}", self.name, status);
    source.try_set(status);
  }

  async fn process(&self) -> CompletionStatus {
    let copy = self.copy.clone();
    let copies = Arc::clone(&self.input)
      .into_stream()
      .map(move |item: T| {
        let copy = copy.clone();
        async move {
          match copy {
            None => Ok((item.clone(), item)),
            Some(function) => {
              match tokio::spawn(async move { function.copy(&item).map(|dup| (dup, item)) }).await
              {
                Ok(result) => result,
                Err(join_error) => Err(NodeExecutionError::from(join_error)),
              }
            }
          }
        }
      })
      .buffered(self.parallelism);
    tokio::pin!(copies);

    let mut processed = 0u64;
    loop {
      let next = tokio::select! {
        biased;
        _ = self.cancel.cancelled() => return self.interrupted(),
        next = copies.next() => next,
      };
      let Some(result) = next else {
        break;
      };
      let (duplicate, item) = match result {
        Ok(pair) => pair,
        Err(error) => {
          warn!("TeeWorker(name={}) copy failed: {}", self.name, error);
          return CompletionStatus::Faulted(FlowError::CopyFailed {
            node: self.name.clone(),
            reason: error.to_string(),
          });
        }
      };

      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => return self.interrupted(),
        _ = self.duplicates.safe_post(duplicate) => {}
      }

      let sent = tokio::select! {
        biased;
        _ = self.cancel.cancelled() => return self.interrupted(),
        sent = self.output.send(item) => sent,
      };
      if let Err(error) = sent {
        return self.failed(error);
      }

      processed += 1;
      trace!("TeeWorker(name={}) processed={}", self.name, processed);
    }

    debug!(
      "TeeWorker(name={}) input exhausted after {} items",
      self.name, processed
    );
    match self.input.completion().wait().await {
      CompletionStatus::Faulted(error) => self.failed(error),
      status => status,
    }
  }

  fn recorded_fault(&self) -> Option<FlowError> {
    self
      .fault_reason
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn interrupted(&self) -> CompletionStatus {
    match self.recorded_fault() {
      Some(error) => CompletionStatus::Faulted(error),
      None => CompletionStatus::Canceled,
    }
  }

  fn failed(&self, fallback: FlowError) -> CompletionStatus {
    CompletionStatus::Faulted(self.recorded_fault().unwrap_or(fallback))
  }
}
