//! # Branch Node
//!
//! Type-erased wrapper that exposes a [`DataBrancher`] to a StreamWeave graph.
//!
//! ## Ports
//!
//! - **Input**: `"in"` - Receives data items
//! - **Output**: `"out"` - Every item, unchanged
//! - **Output**: `"copy"` - Every item (or its configured copy), in the same order
//!
//! Without a copy function the `"copy"` port receives a clone of the same
//! `Arc`, so both ports share one allocation per item.

use crate::brancher::DataBrancher;
use crate::dataflow::GraphNode;
use crate::node::{AnyItem, InputStreams, Node, NodeExecutionError, OutputStream, OutputStreams};
use crate::nodes::common::{BaseNode, forward_stream};
use crate::options::DataflowOptions;
use crate::worker::CopyConfig;
use std::collections::HashMap;
use std::pin::Pin;
use tracing::debug;

/// A node that duplicates its `"in"` stream onto `"out"` and `"copy"`.
pub struct BranchNode {
  /// Base node functionality.
  pub(crate) base: BaseNode,
  options: DataflowOptions,
  copy: Option<CopyConfig<AnyItem>>,
}

impl BranchNode {
  /// Creates a BranchNode with default options and no copy function.
  pub fn new(name: String) -> Self {
    Self {
      base: BaseNode::new(
        name,
        vec!["in".to_string()],
        vec!["out".to_string(), "copy".to_string()],
      ),
      options: DataflowOptions::default(),
      copy: None,
    }
  }

  /// Sets the options used for the brancher built on each execution.
  #[must_use]
  pub fn with_options(mut self, options: DataflowOptions) -> Self {
    self.options = options;
    self
  }

  /// Sets the copy function applied to items on the `"copy"` port.
  #[must_use]
  pub fn with_copy_fn(mut self, copy: CopyConfig<AnyItem>) -> Self {
    self.copy = Some(copy);
    self
  }

  /// Returns whether a copy function is configured.
  pub fn has_copy_fn(&self) -> bool {
    self.copy.is_some()
  }
}

impl Node for BranchNode {
  fn name(&self) -> &str {
    self.base.name()
  }

  fn set_name(&mut self, name: &str) {
    self.base.set_name(name);
  }

  fn input_port_names(&self) -> &[String] {
    self.base.input_port_names()
  }

  fn output_port_names(&self) -> &[String] {
    self.base.output_port_names()
  }

  fn has_input_port(&self, name: &str) -> bool {
    self.base.has_input_port(name)
  }

  fn has_output_port(&self, name: &str) -> bool {
    self.base.has_output_port(name)
  }

  fn execute(
    &self,
    mut inputs: InputStreams,
  ) -> Pin<
    Box<dyn std::future::Future<Output = Result<OutputStreams, NodeExecutionError>> + Send + '_>,
  > {
    let options = self.options.clone().with_name(self.base.name());
    let copy = self.copy.clone();

    Box::pin(async move {
      let data_stream = inputs.remove("in").ok_or("Missing 'in' input")?;
      options.validate()?;

      let brancher = match copy {
        Some(copy) => DataBrancher::with_copy_fn(copy, options),
        None => DataBrancher::new(options),
      };
      debug!("BranchNode::execute(name={})", brancher.name());
      forward_stream(data_stream, brancher.input());

      let mut outputs = HashMap::new();
      outputs.insert(
        "out".to_string(),
        Box::pin(brancher.output().into_stream()) as OutputStream,
      );
      outputs.insert(
        "copy".to_string(),
        Box::pin(brancher.copied_output().into_stream()) as OutputStream,
      );

      Ok::<OutputStreams, NodeExecutionError>(outputs)
    })
  }
}
