//! # StreamWeave Brancher
//!
//! Lossless stream duplication for StreamWeave dataflow graphs.
//!
//! A [`brancher::DataBrancher`] takes one input stream and produces two
//! outputs: the primary output passes every item through unchanged, the
//! copied output receives every item (optionally transformed) in the same
//! order. A slow consumer on either branch causes backpressure, never loss.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamweave_brancher::brancher::DataBrancher;
//! use streamweave_brancher::dataflow::GraphNode;
//! use streamweave_brancher::options::DataflowOptions;
//! use streamweave_brancher::worker::copy_fn;
//!
//! # async fn run() {
//! let options = DataflowOptions::new().with_name("audit").with_recommended_capacity(16);
//! let brancher = DataBrancher::with_copy_fn(copy_fn(|x: &i32| x * 10), options);
//!
//! brancher.input().send(4).await.unwrap();
//! brancher.complete();
//!
//! assert_eq!(brancher.output().recv().await, Some(4));
//! assert_eq!(brancher.copied_output().recv().await, Some(40));
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Data brancher node facade.
pub mod brancher;
/// Bounded buffer block used for ports and the duplicate stream.
pub mod buffer;
/// Terminal status signalling.
pub mod completion;
/// Completion coordination between the tee worker and the duplicate buffer.
pub mod coordinator;
/// Graph-node capability, child registration and linking.
pub mod dataflow;
/// Error types.
pub mod error;
/// Type-erased node interface.
pub mod node;
/// Type-erased nodes.
pub mod nodes;
/// Dataflow options.
pub mod options;
/// Tee worker and copy functions.
pub mod worker;

pub use brancher::DataBrancher;
pub use buffer::{BufferBlock, BufferState, PostOutcome};
pub use completion::{Completion, CompletionStatus};
pub use dataflow::{GraphNode, link_block_to_flow, safe_post};
pub use error::FlowError;
pub use options::DataflowOptions;
pub use worker::{CopyConfig, CopyFunction, copy_fn, try_copy_fn};

#[cfg(test)]
mod brancher_test;
