//! # Type-Erased Node Interface
//!
//! The stream-based `Node` trait used to plug dataflow nodes into a
//! StreamWeave graph. Items flow as `Arc<dyn Any + Send + Sync>`, so fan-out
//! only clones the `Arc`.
//!
//! ## Port Naming Convention
//!
//! - Single input port: `"in"`
//! - Primary output port: `"out"`
//! - Duplicate output port of a brancher: `"copy"`
//!
//! ## Execution Model
//!
//! The graph engine collects a node's input streams from upstream nodes,
//! calls `execute(inputs)`, and connects the returned output streams to
//! downstream nodes. Backpressure is carried by the bounded buffers behind
//! each output stream.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// Item type flowing between type-erased nodes.
pub type AnyItem = Arc<dyn Any + Send + Sync>;

/// Type alias for input streams.
pub type InputStream = Pin<Box<dyn Stream<Item = AnyItem> + Send>>;

/// Type alias for output streams.
pub type OutputStream = Pin<Box<dyn Stream<Item = AnyItem> + Send>>;

/// Type alias for a collection of input streams, keyed by port name.
pub type InputStreams = HashMap<String, InputStream>;

/// Type alias for a collection of output streams, keyed by port name.
pub type OutputStreams = HashMap<String, OutputStream>;

/// Error type for node execution and user-supplied functions.
pub type NodeExecutionError = Box<dyn std::error::Error + Send + Sync>;

/// The type-erased node trait.
///
/// `execute` consumes the input streams it needs and returns the node's
/// output streams. Streams left in `inputs` are dropped.
pub trait Node: Send + Sync {
  /// Returns the name of the node.
  fn name(&self) -> &str;

  /// Sets the name of the node.
  fn set_name(&mut self, name: &str);

  /// Returns the names of all input ports, in order.
  fn input_port_names(&self) -> &[String];

  /// Returns the names of all output ports, in order.
  fn output_port_names(&self) -> &[String];

  /// Checks if this node has an input port with the given name.
  fn has_input_port(&self, name: &str) -> bool;

  /// Checks if this node has an output port with the given name.
  fn has_output_port(&self, name: &str) -> bool;

  /// Executes the node's logic.
  ///
  /// # Arguments
  ///
  /// * `inputs` - Input streams keyed by port name. The node removes the
  ///   streams it needs.
  ///
  /// # Returns
  ///
  /// Output streams keyed by port name.
  fn execute(
    &self,
    inputs: InputStreams,
  ) -> Pin<Box<dyn Future<Output = Result<OutputStreams, NodeExecutionError>> + Send + '_>>;
}
