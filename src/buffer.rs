//! # Buffer Block
//!
//! An ordered, capacity-bounded, concurrency-safe queue. It backs the tee
//! worker's input and primary output ports and holds the duplicate stream
//! destined for the secondary consumer.
//!
//! ## States
//!
//! - `Open`: accepts items.
//! - `Draining`: `complete()` was called while items were resident; no more
//!   items are accepted but the remaining ones can still be received.
//! - `Completed`: terminal, reached once a completed buffer is empty.
//! - `Faulted`: terminal, resident items are discarded.
//!
//! ## Submission
//!
//! [`BufferBlock::send`] suspends while the buffer is full and fails once the
//! buffer stops accepting items. [`BufferBlock::safe_post`] behaves the same
//! except that a closed buffer silently drops the value: shutdown races are
//! expected and a value posted after completion has no live consumer.

use crate::completion::{Completion, CompletionSource, CompletionStatus};
use crate::error::FlowError;
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Lifecycle state of a [`BufferBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
  /// Accepts items.
  Open,
  /// Completed with items still resident.
  Draining,
  /// Completed and empty. Terminal.
  Completed,
  /// Faulted. Terminal.
  Faulted,
}

impl BufferState {
  /// Returns true for `Completed` and `Faulted`.
  #[must_use]
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Faulted)
  }

  /// Returns true while new items may be enqueued.
  #[must_use]
  pub fn accepts_items(self) -> bool {
    self == Self::Open
  }
}

/// Outcome of a [`BufferBlock::safe_post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
  /// The value was enqueued.
  Accepted,
  /// The buffer no longer accepts items; the value was dropped.
  Dropped,
}

struct Inner<T> {
  items: VecDeque<T>,
  state: BufferState,
}

/// Bounded FIFO buffer with explicit completion and fault signals.
pub struct BufferBlock<T> {
  name: String,
  capacity: usize,
  inner: Mutex<Inner<T>>,
  /// Woken when an item is removed or the buffer stops accepting items.
  space_freed: Notify,
  /// Woken when an item is added or the buffer reaches a terminal state.
  item_added: Notify,
  completion: CompletionSource,
}

impl<T> BufferBlock<T> {
  /// Creates an open buffer holding at most `capacity` items (at least one).
  pub fn new(name: impl Into<String>, capacity: usize) -> Self {
    Self {
      name: name.into(),
      capacity: capacity.max(1),
      inner: Mutex::new(Inner {
        items: VecDeque::new(),
        state: BufferState::Open,
      }),
      space_freed: Notify::new(),
      item_added: Notify::new(),
      completion: CompletionSource::new(),
    }
  }

  /// Creates an open buffer with no practical bound.
  pub fn unbounded(name: impl Into<String>) -> Self {
    Self::new(name, usize::MAX)
  }

  /// Returns the buffer name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the capacity.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Returns the number of resident items.
  pub fn len(&self) -> usize {
    self.lock().items.len()
  }

  /// Returns true if no items are resident.
  pub fn is_empty(&self) -> bool {
    self.lock().items.is_empty()
  }

  /// Returns the current state.
  pub fn state(&self) -> BufferState {
    self.lock().state
  }

  /// Returns a handle observing the buffer's terminal status.
  pub fn completion(&self) -> Completion {
    self.completion.completion()
  }

  fn lock(&self) -> MutexGuard<'_, Inner<T>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Enqueues `item`, suspending while the buffer is full.
  ///
  /// Fails with [`FlowError::Closed`] if the buffer stops accepting items
  /// before the item could be enqueued.
  pub async fn send(&self, item: T) -> Result<(), FlowError> {
    match self.enqueue(item).await {
      Ok(()) => Ok(()),
      Err(_rejected) => Err(FlowError::Closed {
        node: self.name.clone(),
      }),
    }
  }

  /// Enqueues `item`, suspending while the buffer is full.
  ///
  /// If the buffer no longer accepts items the value is dropped and
  /// [`PostOutcome::Dropped`] is returned instead of an error.
  pub async fn safe_post(&self, item: T) -> PostOutcome {
    match self.enqueue(item).await {
      Ok(()) => PostOutcome::Accepted,
      Err(_dropped) => {
        debug!("BufferBlock::safe_post(name={}) dropped value", self.name);
        PostOutcome::Dropped
      }
    }
  }

  async fn enqueue(&self, item: T) -> Result<(), T> {
    loop {
      let space_freed = self.space_freed.notified();
      tokio::pin!(space_freed);
      space_freed.as_mut().enable();

      {
        let mut inner = self.lock();
        if !inner.state.accepts_items() {
          return Err(item);
        }
        if inner.items.len() < self.capacity {
          inner.items.push_back(item);
          let len = inner.items.len();
          drop(inner);
          trace!("BufferBlock::enqueue(name={}) len={}", self.name, len);
          self.item_added.notify_waiters();
          return Ok(());
        }
      }

      trace!("BufferBlock::enqueue(name={}) full, waiting", self.name);
      space_freed.await;
    }
  }

  /// Removes the oldest item, suspending while the buffer is empty.
  ///
  /// Returns `None` once the buffer is completed or faulted.
  pub async fn recv(&self) -> Option<T> {
    loop {
      let item_added = self.item_added.notified();
      tokio::pin!(item_added);
      item_added.as_mut().enable();

      {
        let mut inner = self.lock();
        if let Some(item) = inner.items.pop_front() {
          let drained = inner.state == BufferState::Draining && inner.items.is_empty();
          if drained {
            inner.state = BufferState::Completed;
          }
          drop(inner);
          self.space_freed.notify_waiters();
          if drained {
            debug!("BufferBlock(name={}) drained, completed", self.name);
            self.finish(CompletionStatus::RanToCompletion);
          }
          return Some(item);
        }
        if inner.state.is_terminal() {
          return None;
        }
      }

      item_added.await;
    }
  }

  /// Stops accepting items. The buffer completes once its resident items are received.
  ///
  /// Returns false if the buffer was not `Open` (already draining, completed
  /// or faulted).
  pub fn complete(&self) -> bool {
    let mut inner = self.lock();
    if inner.state != BufferState::Open {
      return false;
    }
    if inner.items.is_empty() {
      inner.state = BufferState::Completed;
      drop(inner);
      debug!("BufferBlock::complete(name={}) completed", self.name);
      self.finish(CompletionStatus::RanToCompletion);
    } else {
      inner.state = BufferState::Draining;
      let len = inner.items.len();
      drop(inner);
      debug!("BufferBlock::complete(name={}) draining {} items", self.name, len);
      self.space_freed.notify_waiters();
    }
    true
  }

  /// Faults the buffer, discarding resident items and releasing all waiters.
  ///
  /// Returns false if the buffer was already in a terminal state.
  pub fn fault(&self, error: FlowError) -> bool {
    let discarded = {
      let mut inner = self.lock();
      if inner.state.is_terminal() {
        return false;
      }
      inner.state = BufferState::Faulted;
      std::mem::take(&mut inner.items)
    };
    warn!(
      "BufferBlock::fault(name={}) discarded {} items: {}",
      self.name,
      discarded.len(),
      error
    );
    drop(discarded);
    self.finish(CompletionStatus::Faulted(error));
    true
  }

  fn finish(&self, status: CompletionStatus) {
    self.completion.try_set(status);
    self.space_freed.notify_waiters();
    self.item_added.notify_waiters();
  }
}

impl<T> BufferBlock<T>
where
  T: Send + 'static,
{
  /// Adapts the read side of the buffer into a stream ending at completion or fault.
  pub fn into_stream(self: Arc<Self>) -> impl Stream<Item = T> + Send {
    async_stream::stream! {
      while let Some(item) = self.recv().await {
        yield item;
      }
    }
  }
}

impl<T> fmt::Debug for BufferBlock<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.lock();
    f.debug_struct("BufferBlock")
      .field("name", &self.name)
      .field("capacity", &self.capacity)
      .field("len", &inner.items.len())
      .field("state", &inner.state)
      .finish()
  }
}
