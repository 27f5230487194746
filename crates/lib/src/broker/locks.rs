//! Operation-level entity locks.
//!
//! An operation names every exchange and queue it may touch up front and acquires them as
//! one set. Acquisition is all-or-nothing: a caller waits until no key of its set is held
//! and then takes them all at once, so two operations can never hold parts of each other's
//! sets and wait forever. Operations on disjoint sets proceed in parallel.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex, PoisonError};

use tracing::trace;

use crate::entity::EntityKey;
use crate::util::sync::lock;

#[derive(Debug, Default)]
pub(crate) struct EntityLocks {
  held: Mutex<HashSet<EntityKey>>,
  released: Condvar,
}

impl EntityLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Block until every key in `keys` is free, then hold them all.
  ///
  /// Must not be called while the caller already holds a guard from the same locks.
  pub fn acquire(&self, keys: impl IntoIterator<Item = EntityKey>) -> EntityGuard<'_> {
    let keys: BTreeSet<EntityKey> = keys.into_iter().collect();
    let mut held = lock(&self.held);
    while keys.iter().any(|key| held.contains(key)) {
      held = self.released.wait(held).unwrap_or_else(PoisonError::into_inner);
    }
    held.extend(keys.iter().cloned());
    trace!(keys = keys.len(), "entity locks acquired");
    EntityGuard { locks: self, keys }
  }
}

/// Holds a set of entity keys until dropped.
#[derive(Debug)]
pub(crate) struct EntityGuard<'a> {
  locks: &'a EntityLocks,
  keys: BTreeSet<EntityKey>,
}

impl EntityGuard<'_> {
  pub fn holds(&self, key: &EntityKey) -> bool {
    self.keys.contains(key)
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }
}

impl Drop for EntityGuard<'_> {
  fn drop(&mut self) {
    let mut held = lock(&self.locks.held);
    for key in &self.keys {
      held.remove(key);
    }
    drop(held);
    self.locks.released.notify_all();
  }
}
