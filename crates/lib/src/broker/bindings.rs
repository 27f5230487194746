use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::binding::Binding;
use crate::consts::DEFAULT_EXCHANGE;
use crate::entity::{ConnectionId, EntityKey};
use crate::error::BrokerError;
use crate::journal::JournalOp;
use crate::util::sync::{read, write};

use super::Broker;
use super::cascade::{Locked, Planner};

fn default_exchange_refused() -> BrokerError {
  BrokerError::AccessRefused("operation not permitted on the default exchange".to_string())
}

impl Broker {
  /// Bind `queue` to `exchange` under `routing_key`.
  ///
  /// Binding an existing tuple again succeeds without change. The binding is journaled when
  /// both ends are durable.
  ///
  /// # Errors
  ///
  /// * [`BrokerError::NotFound`] - the queue or the exchange does not exist
  /// * [`BrokerError::AccessRefused`] - `exchange` is the default exchange
  pub fn bind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<(), BrokerError> {
    self.bind_as(ConnectionId::ADMIN, queue, exchange, routing_key)
  }

  pub(super) fn bind_as(
    &self,
    conn: ConnectionId,
    queue: &str,
    exchange: &str,
    routing_key: &str,
  ) -> Result<(), BrokerError> {
    self.ensure_open()?;
    if exchange == DEFAULT_EXCHANGE {
      return Err(default_exchange_refused());
    }

    let _guard = self
      .inner
      .locks
      .acquire([EntityKey::exchange(exchange), EntityKey::queue(queue)]);

    let binding = Binding::new(queue, exchange, routing_key);
    let journaled = {
      let topology = read(&self.inner.topology);
      let q = topology.registry.queue(queue).ok_or_else(|| BrokerError::no_queue(queue))?;
      if !q.accessible_by(conn) {
        return Err(BrokerError::ResourceLocked(EntityKey::queue(queue)));
      }
      let x = topology
        .registry
        .exchange(exchange)
        .ok_or_else(|| BrokerError::no_exchange(exchange))?;
      if topology.bindings.contains(&binding) {
        debug!(binding = %binding, "binding already present");
        return Ok(());
      }
      x.def.durable && q.def.persistent()
    };

    if journaled {
      self.record(vec![JournalOp::Bind(binding.clone())])?;
    }

    info!(queue = %queue, exchange = %exchange, routing_key = %routing_key, durable = journaled, "queue bound");
    let mut topology = write(&self.inner.topology);
    if topology.bindings.insert(binding) {
      topology.refs.binding_added(exchange);
    }
    Ok(())
  }

  /// Remove the binding `(queue, exchange, routing_key)`.
  ///
  /// Removing the last binding of an auto-delete exchange deletes the exchange in the same
  /// step.
  ///
  /// # Errors
  ///
  /// * [`BrokerError::NotFound`] - the queue, the exchange or the exact binding does not
  ///   exist; the three cases share one error kind
  /// * [`BrokerError::AccessRefused`] - `exchange` is the default exchange
  pub fn unbind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<(), BrokerError> {
    self.unbind_as(ConnectionId::ADMIN, queue, exchange, routing_key)
  }

  pub(super) fn unbind_as(
    &self,
    conn: ConnectionId,
    queue: &str,
    exchange: &str,
    routing_key: &str,
  ) -> Result<(), BrokerError> {
    self.ensure_open()?;
    if exchange == DEFAULT_EXCHANGE {
      return Err(default_exchange_refused());
    }

    let keys = BTreeSet::from([EntityKey::exchange(exchange), EntityKey::queue(queue)]);
    let binding = Binding::new(queue, exchange, routing_key);

    self.with_locks(keys, |guard| {
      let topology = read(&self.inner.topology);
      let q = topology.registry.queue(queue).ok_or_else(|| BrokerError::no_queue(queue))?;
      if !q.accessible_by(conn) {
        return Err(BrokerError::ResourceLocked(EntityKey::queue(queue)));
      }
      if !topology.registry.contains_exchange(exchange) {
        return Err(BrokerError::no_exchange(exchange));
      }
      if !topology.bindings.contains(&binding) {
        return Err(BrokerError::no_binding(&binding));
      }

      let mut planner = Planner::new(&topology, guard);
      planner.unbind(binding.clone());
      match planner.finish() {
        Ok(plan) => {
          drop(topology);
          info!(queue = %queue, exchange = %exchange, routing_key = %routing_key, "queue unbound");
          self.commit(plan, |_| {})?;
          Ok(Locked::Done(()))
        }
        Err(missing) => Ok(Locked::Widen(missing)),
      }
    })
  }
}
