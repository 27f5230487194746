use std::collections::BTreeSet;

use tracing::info;

use crate::entity::{ConnectionId, EntityKey};
use crate::error::BrokerError;
use crate::util::sync::read;

use super::Broker;
use super::cascade::{Cause, Locked, Planner};

impl Broker {
  /// Delete a queue and every binding that references it.
  ///
  /// Exchanges left without bindings are auto-deleted when declared so.
  ///
  /// # Arguments
  ///
  /// * `if_unused` - refuse while the queue has consumers
  /// * `if_empty` - refuse while the queue holds messages
  ///
  /// # Returns
  ///
  /// The number of pending messages dropped with the queue.
  pub fn delete_queue(&self, name: &str, if_unused: bool, if_empty: bool) -> Result<u32, BrokerError> {
    self.delete_queue_as(ConnectionId::ADMIN, name, if_unused, if_empty, Cause::Requested)
  }

  pub(super) fn delete_queue_as(
    &self,
    conn: ConnectionId,
    name: &str,
    if_unused: bool,
    if_empty: bool,
    cause: Cause,
  ) -> Result<u32, BrokerError> {
    self.ensure_open()?;

    let mut keys = BTreeSet::from([EntityKey::queue(name)]);
    keys.extend(
      read(&self.inner.topology)
        .bindings
        .exchanges_for_queue(name)
        .into_iter()
        .map(EntityKey::Exchange),
    );

    self.with_locks(keys, |guard| {
      let topology = read(&self.inner.topology);
      let queue = topology.registry.queue(name).ok_or_else(|| BrokerError::no_queue(name))?;
      if !queue.accessible_by(conn) {
        return Err(BrokerError::ResourceLocked(EntityKey::queue(name)));
      }
      if if_unused {
        let consumers = topology.refs.consumers(name);
        if consumers > 0 {
          return Err(BrokerError::PreconditionFailed(format!(
            "queue '{}' in use ({} consumers)",
            name, consumers
          )));
        }
      }
      if if_empty {
        let messages = self.inner.store.message_count(name);
        if messages > 0 {
          return Err(BrokerError::PreconditionFailed(format!(
            "queue '{}' not empty ({} messages)",
            name, messages
          )));
        }
      }

      let mut planner = Planner::new(&topology, guard);
      planner.delete_queue(name, cause);
      let plan = match planner.finish() {
        Ok(plan) => plan,
        Err(missing) => return Ok(Locked::Widen(missing)),
      };
      drop(topology);

      let dropped = self.commit(plan, |_| {})?;
      let messages = dropped
        .into_iter()
        .find(|(queue, _)| queue == name)
        .map_or(0, |(_, messages)| messages);
      Ok(Locked::Done(messages))
    })
  }

  /// Delete an exchange and every binding that references it.
  ///
  /// # Errors
  ///
  /// * [`BrokerError::NotFound`] - the exchange does not exist
  /// * [`BrokerError::PreconditionFailed`] - `if_unused` is set and a binding references it
  /// * [`BrokerError::AccessRefused`] - the exchange is built in
  pub fn delete_exchange(&self, name: &str, if_unused: bool) -> Result<(), BrokerError> {
    self.ensure_open()?;

    let mut keys = BTreeSet::from([EntityKey::exchange(name)]);
    keys.extend(
      read(&self.inner.topology)
        .bindings
        .queues_for_exchange(name)
        .into_iter()
        .map(EntityKey::Queue),
    );

    self.with_locks(keys, |guard| {
      let topology = read(&self.inner.topology);
      let exchange = topology
        .registry
        .exchange(name)
        .ok_or_else(|| BrokerError::no_exchange(name))?;
      if exchange.builtin {
        return Err(BrokerError::AccessRefused(format!(
          "{} is built in and cannot be deleted",
          EntityKey::exchange(name)
        )));
      }
      if if_unused {
        let bindings = topology.refs.bindings(name);
        if bindings > 0 {
          return Err(BrokerError::PreconditionFailed(format!(
            "exchange '{}' in use ({} bindings)",
            name, bindings
          )));
        }
      }

      let mut planner = Planner::new(&topology, guard);
      planner.delete_exchange(name, Cause::Requested);
      let plan = match planner.finish() {
        Ok(plan) => plan,
        Err(missing) => return Ok(Locked::Widen(missing)),
      };
      drop(topology);

      self.commit(plan, |_| {})?;
      Ok(Locked::Done(()))
    })
  }

  /// Discard every pending message of a queue. Bindings are untouched.
  ///
  /// Returns the number of messages discarded.
  pub fn purge_queue(&self, name: &str) -> Result<u32, BrokerError> {
    self.purge_queue_as(ConnectionId::ADMIN, name)
  }

  pub(super) fn purge_queue_as(&self, conn: ConnectionId, name: &str) -> Result<u32, BrokerError> {
    self.ensure_open()?;
    let _guard = self.inner.locks.acquire([EntityKey::queue(name)]);

    {
      let topology = read(&self.inner.topology);
      let queue = topology.registry.queue(name).ok_or_else(|| BrokerError::no_queue(name))?;
      if !queue.accessible_by(conn) {
        return Err(BrokerError::ResourceLocked(EntityKey::queue(name)));
      }
    }

    let purged = self.inner.store.purge(name);
    info!(queue = %name, messages = purged, "queue purged");
    Ok(purged)
  }
}
