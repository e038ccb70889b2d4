//! # Graph Node Library
//!
//! Type-erased nodes implementing the `Node` trait with zero-copy data passing
//! via `Arc<dyn Any + Send + Sync>`.

pub mod branch_node;
pub mod common;


pub use branch_node::BranchNode;
