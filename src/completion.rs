//! # Completion
//!
//! Terminal status of a block, worker or node, and the once-only signal used
//! to publish it.
//!
//! A [`CompletionSource`] is held by whoever drives the unit; any number of
//! [`Completion`] handles can observe it. The status is set at most once.

use crate::error::FlowError;
use tokio::sync::watch;

/// Terminal status of a dataflow unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
  /// All work finished successfully.
  RanToCompletion,
  /// The unit stopped because of an error.
  Faulted(FlowError),
  /// The unit was canceled before it finished.
  Canceled,
}

impl CompletionStatus {
  /// Returns true for [`CompletionStatus::RanToCompletion`].
  #[must_use]
  pub fn is_success(&self) -> bool {
    matches!(self, Self::RanToCompletion)
  }

  /// Returns the fault carried by this status, if any.
  #[must_use]
  pub fn error(&self) -> Option<&FlowError> {
    match self {
      Self::Faulted(error) => Some(error),
      _ => None,
    }
  }
}

/// Write side of a completion signal.
#[derive(Debug)]
pub struct CompletionSource {
  tx: watch::Sender<Option<CompletionStatus>>,
}

impl CompletionSource {
  /// Creates an unset completion signal.
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(None);
    Self { tx }
  }

  /// Publishes `status`. Returns false if a status was already published.
  pub fn try_set(&self, status: CompletionStatus) -> bool {
    self.tx.send_if_modified(|current| {
      if current.is_some() {
        return false;
      }
      *current = Some(status);
      true
    })
  }

  /// Returns a handle observing this signal.
  pub fn completion(&self) -> Completion {
    Completion {
      rx: self.tx.subscribe(),
    }
  }
}

impl Default for CompletionSource {
  fn default() -> Self {
    Self::new()
  }
}

/// Read side of a completion signal.
#[derive(Debug, Clone)]
pub struct Completion {
  rx: watch::Receiver<Option<CompletionStatus>>,
}

impl Completion {
  /// Returns the published status without waiting.
  pub fn status(&self) -> Option<CompletionStatus> {
    self.rx.borrow().clone()
  }

  /// Returns true once a status has been published.
  pub fn is_completed(&self) -> bool {
    self.rx.borrow().is_some()
  }

  /// Waits until a status is published.
  ///
  /// A source dropped without publishing is reported as canceled.
  pub async fn wait(&self) -> CompletionStatus {
    let mut rx = self.rx.clone();
    let status = match rx.wait_for(Option::is_some).await {
      Ok(current) => current.clone().unwrap_or(CompletionStatus::Canceled),
      Err(_) => CompletionStatus::Canceled,
    };
    status
  }
}
