//! Reference counting that drives auto-delete.
//!
//! Counts consumers per queue and bindings per exchange. The tracker never decides whether
//! an entity exists; the registry does. The broker updates counts under the same topology
//! write lock that mutates the binding table or attaches a consumer.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ReferenceTracker {
  consumers: HashMap<String, u32>,
  bindings: HashMap<String, usize>,
}

impl ReferenceTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a new consumer on `queue`, returning the new count.
  pub fn consumer_added(&mut self, queue: &str) -> u32 {
    let count = self.consumers.entry(queue.to_string()).or_default();
    *count += 1;
    *count
  }

  /// Record a cancelled consumer, returning the remaining count, or `None` if the queue
  /// had no consumer to remove.
  ///
  /// Only a removal that returns `Some(0)` orphans a queue; a fresh queue that never had a
  /// consumer is not orphaned.
  pub fn consumer_removed(&mut self, queue: &str) -> Option<u32> {
    let count = self.consumers.get_mut(queue)?;
    *count = count.checked_sub(1)?;
    let remaining = *count;
    if remaining == 0 {
      self.consumers.remove(queue);
    }
    Some(remaining)
  }

  pub fn consumers(&self, queue: &str) -> u32 {
    self.consumers.get(queue).copied().unwrap_or(0)
  }

  pub fn binding_added(&mut self, exchange: &str) -> usize {
    let count = self.bindings.entry(exchange.to_string()).or_default();
    *count += 1;
    *count
  }

  /// Record `n` removed bindings of `exchange`, returning the remaining count.
  pub fn bindings_removed(&mut self, exchange: &str, n: usize) -> usize {
    let Some(count) = self.bindings.get_mut(exchange) else {
      return 0;
    };
    *count = count.saturating_sub(n);
    let remaining = *count;
    if remaining == 0 {
      self.bindings.remove(exchange);
    }
    remaining
  }

  pub fn bindings(&self, exchange: &str) -> usize {
    self.bindings.get(exchange).copied().unwrap_or(0)
  }

  /// Drop all counts for a deleted queue. A re-declared queue starts fresh.
  pub fn forget_queue(&mut self, queue: &str) {
    self.consumers.remove(queue);
  }

  /// Drop all counts for a deleted exchange.
  pub fn forget_exchange(&mut self, exchange: &str) {
    self.bindings.remove(exchange);
  }
}
