//! # Dataflow Options
//!
//! Tunable parameters shared by the blocks of a dataflow node: buffer
//! capacity, worker parallelism and completion propagation across links.
//!
//! Options can be built in code with the `with_*` methods or loaded from JSON:
//!
//! ```rust
//! use streamweave_brancher::options::DataflowOptions;
//!
//! let options = DataflowOptions::from_json(r#"{ "recommended_capacity": 64 }"#).unwrap();
//! assert_eq!(options.bounded_capacity(), 64);
//! assert_eq!(options.max_degree_of_parallelism, 1);
//! ```

use crate::error::FlowError;
use serde::{Deserialize, Serialize};

/// Options supplied to a dataflow node when it is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataflowOptions {
  /// Name of the node. Child blocks derive their names from it.
  pub name: Option<String>,
  /// Upper bound on items resident in each internal buffer.
  /// `None` means effectively unbounded.
  pub recommended_capacity: Option<usize>,
  /// Number of items whose copy may be computed concurrently.
  pub max_degree_of_parallelism: usize,
  /// Whether links forward completion from upstream to downstream.
  pub propagate_completion: bool,
}

impl Default for DataflowOptions {
  fn default() -> Self {
    Self {
      name: None,
      recommended_capacity: None,
      max_degree_of_parallelism: 1,
      propagate_completion: true,
    }
  }
}

impl DataflowOptions {
  /// Creates options with default values.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the node name.
  #[must_use]
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Sets the recommended buffer capacity.
  #[must_use]
  pub fn with_recommended_capacity(mut self, capacity: usize) -> Self {
    self.recommended_capacity = Some(capacity);
    self
  }

  /// Sets the copy parallelism. Values below 1 are raised to 1.
  #[must_use]
  pub fn with_max_degree_of_parallelism(mut self, parallelism: usize) -> Self {
    self.max_degree_of_parallelism = parallelism.max(1);
    self
  }

  /// Sets whether links propagate completion.
  #[must_use]
  pub fn with_propagate_completion(mut self, propagate: bool) -> Self {
    self.propagate_completion = propagate;
    self
  }

  /// Resolves the capacity used for internal buffers.
  ///
  /// An unset capacity resolves to `usize::MAX`; a capacity of zero is raised to one.
  #[must_use]
  pub fn bounded_capacity(&self) -> usize {
    self.recommended_capacity.unwrap_or(usize::MAX).max(1)
  }

  /// Checks that the options describe a usable node.
  pub fn validate(&self) -> Result<(), FlowError> {
    if self.recommended_capacity == Some(0) {
      return Err(FlowError::InvalidOptions(
        "recommended_capacity must be at least 1".to_string(),
      ));
    }
    if self.max_degree_of_parallelism == 0 {
      return Err(FlowError::InvalidOptions(
        "max_degree_of_parallelism must be at least 1".to_string(),
      ));
    }
    Ok(())
  }

  /// Parses and validates options from a JSON document. Missing fields take their defaults.
  pub fn from_json(json: &str) -> Result<Self, FlowError> {
    let options: Self =
      serde_json::from_str(json).map_err(|e| FlowError::InvalidOptions(e.to_string()))?;
    options.validate()?;
    Ok(options)
  }
}
