//! Message store collaborator.
//!
//! The lifecycle core never inspects message bodies. It pushes routed messages, pops them
//! for fetches, purges, asks for pending counts when deletion preconditions need them, and
//! drops a queue's backlog when the queue goes away.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::util::sync::lock;

/// A published message as seen by a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  pub exchange: String,
  pub routing_key: String,
  pub payload: Vec<u8>,
}

pub trait MessageStore: Send + Sync + std::fmt::Debug {
  fn push(&self, queue: &str, message: Message);

  /// Remove and return the oldest message of `queue`.
  fn pop(&self, queue: &str) -> Option<Message>;

  /// Discard every pending message of `queue`, returning how many were dropped.
  fn purge(&self, queue: &str) -> u32;

  fn message_count(&self, queue: &str) -> u32;

  /// Forget `queue` entirely, returning how many pending messages were dropped.
  fn drop_queue(&self, queue: &str) -> u32;
}

/// Volatile FIFO store. Contents do not survive a broker restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
  queues: Mutex<HashMap<String, VecDeque<Message>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl MessageStore for MemoryStore {
  fn push(&self, queue: &str, message: Message) {
    lock(&self.queues)
      .entry(queue.to_string())
      .or_default()
      .push_back(message);
  }

  fn pop(&self, queue: &str) -> Option<Message> {
    lock(&self.queues).get_mut(queue)?.pop_front()
  }

  fn purge(&self, queue: &str) -> u32 {
    lock(&self.queues)
      .get_mut(queue)
      .map_or(0, |pending| pending.drain(..).count() as u32)
  }

  fn message_count(&self, queue: &str) -> u32 {
    lock(&self.queues).get(queue).map_or(0, |pending| pending.len() as u32)
  }

  fn drop_queue(&self, queue: &str) -> u32 {
    lock(&self.queues)
      .remove(queue)
      .map_or(0, |pending| pending.len() as u32)
  }
}
