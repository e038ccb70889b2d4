//! # Error Types
//!
//! Errors raised by blocks and nodes while moving items through a dataflow.
//!
//! A single [`FlowError`] may be delivered to several children of the same
//! node when a fault propagates, so it is cheap to clone and carries only
//! owned strings.

use thiserror::Error;

/// Error type for dataflow block and node operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
  /// The copy function raised while producing the secondary value.
  #[error("copy function failed in {node}: {reason}")]
  CopyFailed {
    /// Node whose copy function failed.
    node: String,
    /// Error message from the copy function.
    reason: String,
  },
  /// A block or node was faulted.
  #[error("{node} faulted: {reason}")]
  Faulted {
    /// Node that faulted.
    node: String,
    /// Error description.
    reason: String,
  },
  /// A block or node was canceled before it finished.
  #[error("{node} was canceled")]
  Canceled {
    /// Node that was canceled.
    node: String,
  },
  /// The target no longer accepts items (completed, draining or faulted).
  #[error("{node} no longer accepts items")]
  Closed {
    /// Block that rejected the item.
    node: String,
  },
  /// Options failed validation.
  #[error("invalid dataflow options: {0}")]
  InvalidOptions(String),
  /// Linking two nodes failed.
  #[error("failed to link {upstream} -> {downstream}: {reason}")]
  Link {
    /// Name of the upstream block.
    upstream: String,
    /// Name of the downstream node.
    downstream: String,
    /// Error reason.
    reason: String,
  },
}

impl FlowError {
  /// Creates a [`FlowError::Faulted`] for `node`.
  pub fn faulted(node: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::Faulted {
      node: node.into(),
      reason: reason.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_flow_error_display() {
    let error = FlowError::CopyFailed {
      node: "brancher.tee".to_string(),
      reason: "boom".to_string(),
    };
    assert_eq!(
      error.to_string(),
      "copy function failed in brancher.tee: boom"
    );

    let error = FlowError::Link {
      upstream: "a.copy".to_string(),
      downstream: "b".to_string(),
      reason: "closed".to_string(),
    };
    assert_eq!(error.to_string(), "failed to link a.copy -> b: closed");
  }
}
