//! # Completion Coordinator
//!
//! Decides what the duplicate buffer learns about the end of the tee worker's
//! run. Only a successful run completes the buffer. A faulted or canceled run
//! leaves the buffer alone: the owning node's fault propagation finalizes it,
//! and signalling from both places would race.

use crate::buffer::BufferBlock;
use crate::completion::CompletionStatus;
use tracing::debug;

/// What the coordinator did with the duplicate buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorDecision {
  /// The buffer was told to complete.
  Propagated,
  /// No transition was issued.
  Withheld,
}

/// Maps the worker's terminal status onto the duplicate buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionCoordinator;

impl CompletionCoordinator {
  /// Observes the worker's terminal `status` once its input is exhausted and
  /// every admitted item has been processed.
  pub fn observe<T>(status: &CompletionStatus, duplicates: &BufferBlock<T>) -> CoordinatorDecision {
    match status {
      CompletionStatus::RanToCompletion => {
        duplicates.complete();
        debug!(
          "CompletionCoordinator::observe(buffer={}) propagated completion",
          duplicates.name()
        );
        CoordinatorDecision::Propagated
      }
      CompletionStatus::Faulted(_) | CompletionStatus::Canceled => {
        debug!(
          "CompletionCoordinator::observe(buffer={}) withheld completion: {:?}",
          duplicates.name(),
          status
        );
        CoordinatorDecision::Withheld
      }
    }
  }
}
