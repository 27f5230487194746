//! In-memory registry of live exchanges and queues.
//!
//! The registry is the source of truth for existence. It is a plain data structure; the
//! broker serializes mutations of a given name through its entity locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::consts::{BUILTIN_EXCHANGES, GENERATED_QUEUE_PREFIX};

use super::types::{ConnectionId, EntityState, Exchange, ExchangeKind, Queue};

#[derive(Debug)]
pub struct EntityRegistry {
  exchanges: HashMap<String, Exchange>,
  queues: HashMap<String, Queue>,
  names: NameGenerator,
  last_incarnation: u64,
}

impl Default for EntityRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl EntityRegistry {
  /// Create a registry holding only the built-in exchanges.
  pub fn new() -> Self {
    let exchanges = BUILTIN_EXCHANGES
      .iter()
      .filter_map(|(name, kind)| {
        let kind = kind.parse::<ExchangeKind>().ok()?;
        Some((name.to_string(), Exchange::builtin(name, kind)))
      })
      .collect();

    Self {
      exchanges,
      queues: HashMap::new(),
      names: NameGenerator::new(),
      last_incarnation: 0,
    }
  }

  pub fn exchange(&self, name: &str) -> Option<&Exchange> {
    self.exchanges.get(name)
  }

  pub fn queue(&self, name: &str) -> Option<&Queue> {
    self.queues.get(name)
  }

  pub fn contains_exchange(&self, name: &str) -> bool {
    self.exchanges.contains_key(name)
  }

  pub fn contains_queue(&self, name: &str) -> bool {
    self.queues.contains_key(name)
  }

  pub fn insert_exchange(&mut self, exchange: Exchange) {
    self.exchanges.insert(exchange.def.name.clone(), exchange);
  }

  /// Insert `queue` under a fresh incarnation and return it.
  pub fn insert_queue(&mut self, mut queue: Queue) -> u64 {
    self.last_incarnation += 1;
    queue.incarnation = self.last_incarnation;
    self.queues.insert(queue.def.name.clone(), queue);
    self.last_incarnation
  }

  /// Remove an exchange, returning its record marked [`EntityState::Deleted`].
  pub fn remove_exchange(&mut self, name: &str) -> Option<Exchange> {
    let mut removed = self.exchanges.remove(name)?;
    removed.state = EntityState::Deleted;
    Some(removed)
  }

  /// Remove a queue, returning its record marked [`EntityState::Deleted`].
  pub fn remove_queue(&mut self, name: &str) -> Option<Queue> {
    let mut removed = self.queues.remove(name)?;
    removed.state = EntityState::Deleted;
    Some(removed)
  }

  /// All exchanges, sorted by name.
  pub fn exchanges(&self) -> Vec<&Exchange> {
    let mut all: Vec<_> = self.exchanges.values().collect();
    all.sort_by(|a, b| a.def.name.cmp(&b.def.name));
    all
  }

  /// All queues, sorted by name.
  pub fn queues(&self) -> Vec<&Queue> {
    let mut all: Vec<_> = self.queues.values().collect();
    all.sort_by(|a, b| a.def.name.cmp(&b.def.name));
    all
  }

  /// Names of the exclusive queues owned by `conn`.
  pub fn queues_owned_by(&self, conn: ConnectionId) -> Vec<String> {
    let mut owned: Vec<_> = self
      .queues
      .values()
      .filter(|q| q.owner == Some(conn))
      .map(|q| q.def.name.clone())
      .collect();
    owned.sort();
    owned
  }

  /// Draw a server-generated queue name that is not currently taken.
  ///
  /// Names never repeat within one process, and carry a per-process nonce so they do not
  /// collide with generated names recovered from a previous run.
  pub fn generate_queue_name(&self) -> String {
    loop {
      let candidate = self.names.next();
      if !self.contains_queue(&candidate) {
        return candidate;
      }
    }
  }
}

#[derive(Debug)]
struct NameGenerator {
  nonce: u64,
  counter: AtomicU64,
}

impl NameGenerator {
  fn new() -> Self {
    let nanos = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_nanos() as u64;
    Self {
      nonce: nanos ^ (u64::from(std::process::id()) << 32),
      counter: AtomicU64::new(1),
    }
  }

  fn next(&self) -> String {
    let n = self.counter.fetch_add(1, Ordering::Relaxed);
    format!("{}{:016x}-{}", GENERATED_QUEUE_PREFIX, self.nonce, n)
  }
}
