//! # Common Node Utilities
//!
//! Shared helpers for type-erased node implementations.

use crate::buffer::BufferBlock;
use crate::error::FlowError;
use crate::node::{AnyItem, InputStream};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Base node structure that stores the node's name and port names, providing
/// the metadata methods of the `Node` trait.
pub struct BaseNode {
  /// Node name.
  pub name: String,
  /// Input port names, in order.
  pub input_port_names: Vec<String>,
  /// Output port names, in order.
  pub output_port_names: Vec<String>,
}

impl BaseNode {
  /// Creates a new BaseNode with the given name and port names.
  pub fn new(name: String, input_port_names: Vec<String>, output_port_names: Vec<String>) -> Self {
    Self {
      name,
      input_port_names,
      output_port_names,
    }
  }

  /// Returns the node's name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Sets the node's name.
  pub fn set_name(&mut self, name: &str) {
    self.name = name.to_string();
  }

  /// Returns the list of input port names.
  pub fn input_port_names(&self) -> &[String] {
    &self.input_port_names
  }

  /// Returns the list of output port names.
  pub fn output_port_names(&self) -> &[String] {
    &self.output_port_names
  }

  /// Checks if the node has an input port with the given name.
  pub fn has_input_port(&self, name: &str) -> bool {
    self.input_port_names.iter().any(|port| port == name)
  }

  /// Checks if the node has an output port with the given name.
  pub fn has_output_port(&self, name: &str) -> bool {
    self.output_port_names.iter().any(|port| port == name)
  }
}

/// Feeds `stream` into `target` with backpressure, completing `target` when
/// the stream ends.
///
/// If `target` stops accepting items before the stream ends, `target` is
/// faulted with a [`FlowError::Link`] and the task resolves to that error.
pub fn forward_stream(
  mut stream: InputStream,
  target: Arc<BufferBlock<AnyItem>>,
) -> JoinHandle<Result<(), FlowError>> {
  tokio::spawn(async move {
    let mut forwarded = 0u64;
    while let Some(item) = stream.next().await {
      if let Err(error) = target.send(item).await {
        let error = FlowError::Link {
          upstream: "in".to_string(),
          downstream: target.name().to_string(),
          reason: error.to_string(),
        };
        warn!("forward_stream stopped after {} items: {}", forwarded, error);
        target.fault(error.clone());
        return Err(error);
      }
      forwarded += 1;
    }
    debug!("forward_stream(target={}) forwarded {} items", target.name(), forwarded);
    target.complete();
    Ok(())
  })
}
