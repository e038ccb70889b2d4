//! # Dataflow Composition
//!
//! Building blocks shared by composite nodes:
//!
//! - [`GraphNode`]: the capability a node exposes to the graph (input port,
//!   primary output port, completion, fault).
//! - [`DataflowCore`]: registry of a node's child units, built with
//!   [`DataflowCore::builder`]. It aggregates their completion and propagates
//!   the first fault or cancellation to every other child.
//! - [`link_block_to_flow`]: wires a source buffer into another node's input.
//! - [`safe_post`]: non-failing submission into a buffer.

use crate::buffer::{BufferBlock, PostOutcome};
use crate::completion::{Completion, CompletionSource, CompletionStatus};
use crate::error::FlowError;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Callback used to fault a registered child.
pub type FaultHandle = Arc<dyn Fn(FlowError) + Send + Sync>;

/// A node that can be placed in a dataflow graph.
#[async_trait]
pub trait GraphNode<T>: Send + Sync
where
  T: Send + 'static,
{
  /// Returns the node name.
  fn name(&self) -> &str;

  /// Returns the port upstream nodes send items into.
  fn input(&self) -> Arc<BufferBlock<T>>;

  /// Returns the primary output port.
  fn output(&self) -> Arc<BufferBlock<T>>;

  /// Returns a handle observing the node's terminal status.
  fn completion(&self) -> Completion;

  /// Faults the node and all of its children.
  fn fault(&self, error: FlowError);

  /// Signals that no more items will be sent to the node.
  fn complete(&self) {
    self.input().complete();
  }

  /// Waits for the node to reach a terminal status.
  async fn wait_completion(&self) -> CompletionStatus {
    self.completion().wait().await
  }

  /// Links the primary output to `target`'s input, propagating completion.
  fn link_to<N>(&self, target: &N) -> JoinHandle<Result<(), FlowError>>
  where
    Self: Sized,
    N: GraphNode<T> + ?Sized,
  {
    link_block_to_flow(self.output(), target)
  }
}

struct Child {
  name: String,
  completion: Completion,
  fault: FaultHandle,
}

/// Collects the child units of a composite node before tracking starts.
pub struct DataflowCoreBuilder {
  name: String,
  children: Vec<Child>,
}

impl DataflowCoreBuilder {
  /// Registers a child unit.
  pub fn register_child(
    &mut self,
    name: impl Into<String>,
    completion: Completion,
    fault: FaultHandle,
  ) -> &mut Self {
    let name = name.into();
    trace!("DataflowCore::register_child(node={}, child={})", self.name, name);
    self.children.push(Child {
      name,
      completion,
      fault,
    });
    self
  }

  /// Starts tracking the registered children.
  ///
  /// Must be called within a Tokio runtime.
  pub fn seal(self) -> DataflowCore {
    let children: Arc<[Child]> = self.children.into();
    let source = Arc::new(CompletionSource::new());
    debug!(
      "DataflowCore::seal(node={}) tracking {} children",
      self.name,
      children.len()
    );
    tokio::spawn(supervise(
      self.name.clone(),
      Arc::clone(&children),
      Arc::clone(&source),
    ));
    DataflowCore {
      name: self.name,
      children,
      source,
    }
  }
}

/// Tracks the child units owned by a composite node.
pub struct DataflowCore {
  name: String,
  children: Arc<[Child]>,
  source: Arc<CompletionSource>,
}

impl DataflowCore {
  /// Starts collecting the children of node `name`.
  pub fn builder(name: impl Into<String>) -> DataflowCoreBuilder {
    DataflowCoreBuilder {
      name: name.into(),
      children: Vec::new(),
    }
  }

  /// Returns the node name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Faults every registered child with `error`.
  pub fn fault(&self, error: FlowError) {
    warn!("DataflowCore::fault(node={}): {}", self.name, error);
    for child in self.children.iter() {
      (child.fault)(error.clone());
    }
  }

  /// Returns a handle observing the aggregate status of all children.
  pub fn completion(&self) -> Completion {
    self.source.completion()
  }
}

async fn supervise(name: String, children: Arc<[Child]>, source: Arc<CompletionSource>) {
  let mut pending: FuturesUnordered<_> = children
    .iter()
    .enumerate()
    .map(|(index, child)| {
      let completion = child.completion.clone();
      async move { (index, completion.wait().await) }
    })
    .collect();

  let mut first_failure: Option<CompletionStatus> = None;
  while let Some((index, status)) = pending.next().await {
    let child = &children[index];
    if status.is_success() {
      trace!("DataflowCore(node={}) child {} completed", name, child.name);
      continue;
    }
    if first_failure.is_some() {
      continue;
    }

    let error = match &status {
      CompletionStatus::Faulted(error) => error.clone(),
      _ => FlowError::Canceled {
        node: child.name.clone(),
      },
    };
    warn!(
      "DataflowCore(node={}) child {} failed, propagating: {}",
      name, child.name, error
    );
    for (other_index, other) in children.iter().enumerate() {
      if other_index != index {
        (other.fault)(error.clone());
      }
    }
    first_failure = Some(status);
  }

  let status = first_failure.unwrap_or(CompletionStatus::RanToCompletion);
  debug!("DataflowCore(node={}) finished: {:?}", name, status);
  source.try_set(status);
}

/// Submits `value` to `target` without failing.
///
/// A target that no longer accepts items drops the value and reports
/// [`PostOutcome::Dropped`]. A full target suspends the caller.
pub async fn safe_post<T>(target: &BufferBlock<T>, value: T) -> PostOutcome {
  target.safe_post(value).await
}

/// Links `source` into `target`'s input, propagating completion and faults.
pub fn link_block_to_flow<T, N>(
  source: Arc<BufferBlock<T>>,
  target: &N,
) -> JoinHandle<Result<(), FlowError>>
where
  T: Send + 'static,
  N: GraphNode<T> + ?Sized,
{
  link_block_to_flow_with(source, target, true)
}

/// Links `source` into `target`'s input.
///
/// Items are moved with backpressure. When `propagate_completion` is set, a
/// completed source completes the target input. A faulted source always
/// faults the target input.
///
/// If the target stops accepting items, `source` is faulted with a
/// [`FlowError::Link`] so the owning node fails instead of stalling, and the
/// pump resolves to that error.
pub fn link_block_to_flow_with<T, N>(
  source: Arc<BufferBlock<T>>,
  target: &N,
  propagate_completion: bool,
) -> JoinHandle<Result<(), FlowError>>
where
  T: Send + 'static,
  N: GraphNode<T> + ?Sized,
{
  let input = target.input();
  let downstream = target.name().to_string();
  debug!("link_block_to_flow({} -> {})", source.name(), downstream);

  tokio::spawn(async move {
    let mut forwarded = 0u64;
    while let Some(item) = source.recv().await {
      if let Err(error) = input.send(item).await {
        let error = FlowError::Link {
          upstream: source.name().to_string(),
          downstream: downstream.clone(),
          reason: error.to_string(),
        };
        warn!("{}; unlinking after {} items", error, forwarded);
        source.fault(error.clone());
        return Err(error);
      }
      forwarded += 1;
    }

    match source.completion().wait().await {
      CompletionStatus::RanToCompletion => {
        if propagate_completion {
          input.complete();
        }
      }
      CompletionStatus::Faulted(error) => {
        input.fault(error);
      }
      CompletionStatus::Canceled => {
        input.fault(FlowError::Canceled {
          node: source.name().to_string(),
        });
      }
    }
    trace!(
      "link {} -> {} finished after {} items",
      source.name(),
      downstream,
      forwarded
    );
    Ok(())
  })
}
