//! Removal planning and commit.
//!
//! A cascade is planned against the current topology while the operation holds its entity
//! locks, journaled as a single entry, and only then applied under one topology write
//! guard. A journal failure therefore leaves memory untouched, and readers never observe a
//! half-applied cascade.
//!
//! Planning runs in rounds. Each round removes the pending entities together with their
//! bindings, which commit drops from the table in one sweep per entity, then evaluates the exchanges that lost bindings; exchanges that became
//! orphaned form the next round. Every round removes at least one entity of the lock set,
//! so a cascade takes at most as many rounds as the set holds keys.

use std::collections::BTreeSet;
use std::mem;

use tracing::{debug, info, warn};

use crate::binding::Binding;
use crate::entity::EntityKey;
use crate::error::BrokerError;
use crate::journal::JournalOp;
use crate::util::sync::write;

use super::locks::EntityGuard;
use super::{Broker, Topology};

/// Why an entity is being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Cause {
  /// Named by a delete request.
  Requested,
  /// Its last reference went away.
  AutoDelete,
  /// Its owning connection closed.
  OwnerClosed,
}

#[derive(Debug)]
enum Removal {
  Binding(Binding),
  Queue { name: String, cause: Cause },
  Exchange { name: String, cause: Cause },
}

/// Topology changes ready to be journaled and applied.
#[derive(Debug, Default)]
pub(super) struct Plan {
  removals: Vec<Removal>,
  ops: Vec<JournalOp>,
}

impl Plan {
  pub fn removes_queue(&self, name: &str) -> bool {
    self
      .removals
      .iter()
      .any(|r| matches!(r, Removal::Queue { name: queue, .. } if queue == name))
  }

  pub fn removes_exchange(&self, name: &str) -> bool {
    self
      .removals
      .iter()
      .any(|r| matches!(r, Removal::Exchange { name: exchange, .. } if exchange == name))
  }

  /// Journal an extra op ahead of the planned removals.
  pub fn prepend_op(&mut self, op: JournalOp) {
    self.ops.insert(0, op);
  }
}

/// Result of one attempt of an operation under entity locks.
pub(super) enum Locked<T> {
  Done(T),
  /// The plan needs entities the attempt did not lock.
  Widen(BTreeSet<EntityKey>),
}

/// Plans removals against a topology snapshot and the locks an operation holds.
pub(super) struct Planner<'a> {
  topology: &'a Topology,
  guard: &'a EntityGuard<'a>,
  pending: BTreeSet<EntityKey>,
  dirty: BTreeSet<String>,
  causes: Vec<(EntityKey, Cause)>,
  removed: BTreeSet<EntityKey>,
  removed_bindings: BTreeSet<Binding>,
  missing: BTreeSet<EntityKey>,
  plan: Plan,
}

impl<'a> Planner<'a> {
  pub fn new(topology: &'a Topology, guard: &'a EntityGuard<'a>) -> Self {
    Self {
      topology,
      guard,
      pending: BTreeSet::new(),
      dirty: BTreeSet::new(),
      causes: Vec::new(),
      removed: BTreeSet::new(),
      removed_bindings: BTreeSet::new(),
      missing: BTreeSet::new(),
      plan: Plan::default(),
    }
  }

  pub fn delete_queue(&mut self, name: &str, cause: Cause) {
    self.schedule(EntityKey::queue(name), cause);
  }

  pub fn delete_exchange(&mut self, name: &str, cause: Cause) {
    self.schedule(EntityKey::exchange(name), cause);
  }

  /// Remove one binding and re-evaluate its exchange.
  pub fn unbind(&mut self, binding: Binding) {
    if self.require(&EntityKey::exchange(&binding.exchange)) && self.removed_bindings.insert(binding.clone()) {
      self.dirty.insert(binding.exchange.clone());
      if self.journaled(&binding) {
        self.plan.ops.push(JournalOp::Unbind(binding.clone()));
      }
      self.plan.removals.push(Removal::Binding(binding));
    }
  }

  /// Re-evaluate `exchange` for auto-delete as if it had lost a binding.
  pub fn evaluate_exchange(&mut self, exchange: &str) {
    self.dirty.insert(exchange.to_string());
  }

  /// Run the cascade to completion.
  ///
  /// Returns the keys that must be locked as well when the plan reached beyond the held
  /// lock set.
  pub fn finish(mut self) -> Result<Plan, BTreeSet<EntityKey>> {
    let bound = self.guard.len();
    let mut rounds = 0;

    loop {
      for key in mem::take(&mut self.pending) {
        self.remove_entity(key);
      }
      for exchange in mem::take(&mut self.dirty) {
        if self.exchange_orphaned(&exchange) {
          self.schedule(EntityKey::exchange(&exchange), Cause::AutoDelete);
        }
      }
      if self.pending.is_empty() {
        break;
      }
      rounds += 1;
      if rounds > bound {
        warn!(rounds, bound, "cascade exceeded its lock set, stopping");
        break;
      }
    }

    if !self.missing.is_empty() {
      return Err(self.missing);
    }
    Ok(self.plan)
  }

  fn schedule(&mut self, key: EntityKey, cause: Cause) {
    if self.removed.contains(&key) || self.pending.contains(&key) {
      return;
    }
    self.causes.push((key.clone(), cause));
    self.pending.insert(key);
  }

  fn require(&mut self, key: &EntityKey) -> bool {
    if self.guard.holds(key) {
      return true;
    }
    self.missing.insert(key.clone());
    false
  }

  fn cause_of(&self, key: &EntityKey) -> Cause {
    self
      .causes
      .iter()
      .find(|(k, _)| k == key)
      .map_or(Cause::Requested, |(_, cause)| *cause)
  }

  fn journaled(&self, binding: &Binding) -> bool {
    let exchange_durable = self
      .topology
      .registry
      .exchange(&binding.exchange)
      .is_some_and(|x| x.def.durable);
    let queue_persistent = self
      .topology
      .registry
      .queue(&binding.queue)
      .is_some_and(|q| q.def.persistent());
    exchange_durable && queue_persistent
  }

  fn remove_entity(&mut self, key: EntityKey) {
    if !self.require(&key) || self.removed.contains(&key) {
      return;
    }
    let cause = self.cause_of(&key);
    let topology = self.topology;

    match &key {
      EntityKey::Queue(name) => {
        let Some(queue) = topology.registry.queue(name) else {
          return;
        };
        for binding in topology.bindings.for_queue(name) {
          if self.removed_bindings.contains(&binding) || !self.require(&EntityKey::exchange(&binding.exchange)) {
            continue;
          }
          self.dirty.insert(binding.exchange.clone());
          self.removed_bindings.insert(binding);
        }
        if queue.def.persistent() {
          self.plan.ops.push(JournalOp::DeleteQueue { name: name.clone() });
        }
        self.plan.removals.push(Removal::Queue {
          name: name.clone(),
          cause,
        });
      }
      EntityKey::Exchange(name) => {
        let Some(exchange) = topology.registry.exchange(name) else {
          return;
        };
        if exchange.builtin {
          return;
        }
        for binding in topology.bindings.for_exchange(name) {
          if self.removed_bindings.contains(&binding) || !self.require(&EntityKey::queue(&binding.queue)) {
            continue;
          }
          self.removed_bindings.insert(binding);
        }
        if exchange.def.durable {
          self.plan.ops.push(JournalOp::DeleteExchange { name: name.clone() });
        }
        self.plan.removals.push(Removal::Exchange {
          name: name.clone(),
          cause,
        });
      }
    }

    self.removed.insert(key);
  }

  /// Whether `exchange` is auto-delete and every binding the tracker counts for it is
  /// planned away.
  fn exchange_orphaned(&mut self, exchange: &str) -> bool {
    let key = EntityKey::exchange(exchange);
    if self.removed.contains(&key) || !self.require(&key) {
      return false;
    }
    let Some(record) = self.topology.registry.exchange(exchange) else {
      return false;
    };
    if !record.def.auto_delete || record.builtin {
      return false;
    }
    let planned = self
      .removed_bindings
      .iter()
      .filter(|b| b.exchange == exchange)
      .count();
    self.topology.refs.bindings(exchange).saturating_sub(planned) == 0
  }
}

impl Broker {
  /// Run `attempt` under a lock set that starts as `keys` and grows until the attempt
  /// stops asking for more.
  pub(super) fn with_locks<T>(
    &self,
    mut keys: BTreeSet<EntityKey>,
    mut attempt: impl FnMut(&EntityGuard<'_>) -> Result<Locked<T>, BrokerError>,
  ) -> Result<T, BrokerError> {
    loop {
      let guard = self.inner.locks.acquire(keys.iter().cloned());
      match attempt(&guard)? {
        Locked::Done(value) => return Ok(value),
        Locked::Widen(extra) => {
          debug!(held = keys.len(), extra = extra.len(), "lock set grew, retrying");
          keys.extend(extra);
        }
      }
    }
  }

  /// Journal `plan` as one entry, then apply it and `also` under one write guard.
  ///
  /// Returns the number of pending messages dropped with each removed queue.
  pub(super) fn commit(&self, plan: Plan, also: impl FnOnce(&mut Topology)) -> Result<Vec<(String, u32)>, BrokerError> {
    self.record(plan.ops)?;

    let mut dropped = Vec::new();
    let mut topology = write(&self.inner.topology);
    also(&mut topology);

    for removal in plan.removals {
      match removal {
        Removal::Binding(binding) => {
          if topology.bindings.remove_exact(&binding).is_ok() {
            topology.refs.bindings_removed(&binding.exchange, 1);
          }
          debug!(binding = %binding, "binding removed");
        }
        Removal::Queue { name, cause } => {
          for binding in topology.bindings.remove_all_for_queue(&name) {
            topology.refs.bindings_removed(&binding.exchange, 1);
            debug!(binding = %binding, "binding removed with its queue");
          }
          topology.registry.remove_queue(&name);
          topology.refs.forget_queue(&name);
          let messages = self.inner.store.drop_queue(&name);
          match cause {
            Cause::Requested => info!(queue = %name, messages, "queue deleted"),
            Cause::AutoDelete => info!(queue = %name, messages, "queue auto-deleted"),
            Cause::OwnerClosed => info!(queue = %name, messages, "exclusive queue deleted with its connection"),
          }
          dropped.push((name, messages));
        }
        Removal::Exchange { name, cause } => {
          let unbound = topology.bindings.remove_all_for_exchange(&name).len();
          debug!(exchange = %name, bindings = unbound, "bindings removed with their exchange");
          topology.registry.remove_exchange(&name);
          topology.refs.forget_exchange(&name);
          match cause {
            Cause::AutoDelete => info!(exchange = %name, "exchange auto-deleted"),
            Cause::Requested | Cause::OwnerClosed => info!(exchange = %name, "exchange deleted"),
          }
        }
      }
    }

    Ok(dropped)
  }
}
