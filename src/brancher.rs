//! # Data Brancher
//!
//! A node that duplicates its input stream into two lossless outputs: the
//! primary output carries the items unchanged, the copied output carries each
//! item (or `copy(item)`) in the same order.
//!
//! Unlike a broadcast that keeps only the latest value, a slow consumer on
//! either branch applies backpressure instead of losing items. The copied
//! output completes if and only if every item passed through the primary
//! branch successfully; a fault or cancellation reaches it through the
//! node's fault propagation instead.
//!
//! ## Ports
//!
//! - [`GraphNode::input`]: the tee worker's input
//! - [`GraphNode::output`]: the tee worker's output (primary)
//! - [`DataBrancher::copied_output`]: the duplicate buffer (secondary)
//!
//! ## Example
//!
//! ```rust,no_run
//! use streamweave_brancher::brancher::DataBrancher;
//! use streamweave_brancher::dataflow::GraphNode;
//! use streamweave_brancher::options::DataflowOptions;
//!
//! # async fn run() {
//! let brancher = DataBrancher::<i32>::new(DataflowOptions::default());
//! brancher.input().send(1).await.unwrap();
//! brancher.complete();
//!
//! assert_eq!(brancher.output().recv().await, Some(1));
//! assert_eq!(brancher.copied_output().recv().await, Some(1));
//! # }
//! ```

use crate::buffer::BufferBlock;
use crate::completion::Completion;
use crate::dataflow::{DataflowCore, FaultHandle, GraphNode, link_block_to_flow_with};
use crate::error::FlowError;
use crate::options::DataflowOptions;
use crate::worker::{CopyConfig, TeeWorker};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Lossless two-way stream duplicator.
pub struct DataBrancher<T> {
  name: String,
  options: DataflowOptions,
  core: DataflowCore,
  worker: Arc<TeeWorker<T>>,
  duplicates: Arc<BufferBlock<T>>,
}

impl<T> DataBrancher<T>
where
  T: Clone + Send + 'static,
{
  /// Creates a brancher whose copied output receives the items unchanged.
  ///
  /// Must be called within a Tokio runtime.
  pub fn new(options: DataflowOptions) -> Self {
    Self::build(None, options)
  }

  /// Creates a brancher whose copied output receives `copy(item)`.
  ///
  /// Must be called within a Tokio runtime.
  pub fn with_copy_fn(copy: CopyConfig<T>, options: DataflowOptions) -> Self {
    Self::build(Some(copy), options)
  }

  fn build(copy: Option<CopyConfig<T>>, options: DataflowOptions) -> Self {
    let name = options
      .name
      .clone()
      .unwrap_or_else(|| "DataBrancher".to_string());
    let duplicates = Arc::new(BufferBlock::new(
      format!("{name}.copy"),
      options.bounded_capacity(),
    ));
    let worker = Arc::new(TeeWorker::spawn(
      format!("{name}.tee"),
      &options,
      copy,
      Arc::clone(&duplicates),
    ));

    let fault_duplicates: FaultHandle = {
      let duplicates = Arc::clone(&duplicates);
      Arc::new(move |error: FlowError| {
        duplicates.fault(error);
      })
    };
    let fault_worker: FaultHandle = {
      let worker = Arc::clone(&worker);
      Arc::new(move |error: FlowError| worker.fault(error))
    };
    let mut core = DataflowCore::builder(name.clone());
    core
      .register_child(duplicates.name(), duplicates.completion(), fault_duplicates)
      .register_child(worker.name(), worker.completion(), fault_worker);
    let core = core.seal();

    debug!(
      "DataBrancher::new(name={}, capacity={:?})",
      name, options.recommended_capacity
    );
    Self {
      name,
      options,
      core,
      worker,
      duplicates,
    }
  }

  /// Returns the duplicate stream.
  pub fn copied_output(&self) -> Arc<BufferBlock<T>> {
    Arc::clone(&self.duplicates)
  }

  /// Links the duplicate stream to `target`'s input.
  ///
  /// If `target` stops accepting items, the brancher faults with a
  /// [`FlowError::Link`] and the returned handle resolves to that error.
  pub fn link_secondary_to<N>(&self, target: &N) -> JoinHandle<Result<(), FlowError>>
  where
    N: GraphNode<T> + ?Sized,
  {
    link_block_to_flow_with(
      self.copied_output(),
      target,
      self.options.propagate_completion,
    )
  }

  /// Returns the options the brancher was built with.
  pub fn options(&self) -> &DataflowOptions {
    &self.options
  }

  /// Cancels the tee worker. In-flight items reach neither branch.
  pub fn cancel(&self) {
    self.worker.cancel();
  }
}

impl<T> Default for DataBrancher<T>
where
  T: Clone + Send + 'static,
{
  /// Creates an unnamed, unbounded brancher without a copy function.
  ///
  /// Must be called within a Tokio runtime.
  fn default() -> Self {
    Self::new(DataflowOptions::default())
  }
}

impl<T> GraphNode<T> for DataBrancher<T>
where
  T: Clone + Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn input(&self) -> Arc<BufferBlock<T>> {
    self.worker.input()
  }

  fn output(&self) -> Arc<BufferBlock<T>> {
    self.worker.output()
  }

  fn completion(&self) -> Completion {
    self.core.completion()
  }

  fn fault(&self, error: FlowError) {
    self.core.fault(error);
  }
}
