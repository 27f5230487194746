use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::consts::DEFAULT_EXCHANGE;
use crate::entity::{ConnectionId, EntityKey};
use crate::error::BrokerError;
use crate::messages::Message;
use crate::util::sync::{read, write};

use super::{Broker, Topology};
use super::cascade::{Cause, Locked, Plan, Planner};

impl Broker {
  /// Record a consumer attaching to `queue`. Returns the new consumer count.
  pub fn consumer_added(&self, queue: &str) -> Result<u32, BrokerError> {
    self
      .consumer_added_as(ConnectionId::ADMIN, queue)
      .map(|(consumers, _)| consumers)
  }

  /// Returns the new consumer count and the incarnation of the queue the consumer joined.
  pub(super) fn consumer_added_as(&self, conn: ConnectionId, queue: &str) -> Result<(u32, u64), BrokerError> {
    self.ensure_open()?;
    let _guard = self.inner.locks.acquire([EntityKey::queue(queue)]);

    let mut topology = write(&self.inner.topology);
    let record = topology
      .registry
      .queue(queue)
      .ok_or_else(|| BrokerError::no_queue(queue))?;
    if !record.accessible_by(conn) {
      return Err(BrokerError::ResourceLocked(EntityKey::queue(queue)));
    }
    let incarnation = record.incarnation;
    let consumers = topology.refs.consumer_added(queue);
    debug!(queue = %queue, consumers, "consumer added");
    Ok((consumers, incarnation))
  }

  /// Record a consumer detaching from `queue`. Returns the remaining consumer count.
  ///
  /// When the last consumer of an auto-delete queue leaves, the queue is deleted together
  /// with its bindings, which may in turn auto-delete exchanges.
  pub fn consumer_removed(&self, queue: &str) -> Result<u32, BrokerError> {
    self.consumer_removed_from(queue, None)
  }

  /// Like [`Broker::consumer_removed`], but only counts against the queue record with the
  /// given incarnation. A consumer of a queue that was deleted and declared again gets
  /// [`BrokerError::NotFound`] and leaves the new queue untouched.
  pub(super) fn consumer_removed_from(&self, queue: &str, incarnation: Option<u64>) -> Result<u32, BrokerError> {
    self.ensure_open()?;

    let mut keys = BTreeSet::from([EntityKey::queue(queue)]);
    keys.extend(
      read(&self.inner.topology)
        .bindings
        .exchanges_for_queue(queue)
        .into_iter()
        .map(EntityKey::Exchange),
    );

    self.with_locks(keys, |guard| {
      let topology = read(&self.inner.topology);
      let record = topology
        .registry
        .queue(queue)
        .ok_or_else(|| BrokerError::no_queue(queue))?;
      if incarnation.is_some_and(|expected| expected != record.incarnation) {
        debug!(queue = %queue, "consumer belonged to an earlier queue of this name");
        return Err(BrokerError::no_queue(queue));
      }

      let Some(remaining) = topology.refs.consumers(queue).checked_sub(1) else {
        debug!(queue = %queue, "no consumer to remove");
        return Ok(Locked::Done(0));
      };

      let plan = if remaining == 0 && record.def.auto_delete {
        let mut planner = Planner::new(&topology, guard);
        planner.delete_queue(queue, Cause::AutoDelete);
        match planner.finish() {
          Ok(plan) => plan,
          Err(missing) => return Ok(Locked::Widen(missing)),
        }
      } else {
        Plan::default()
      };
      drop(topology);

      self.commit(plan, |topology| {
        topology.refs.consumer_removed(queue);
      })?;
      debug!(queue = %queue, consumers = remaining, "consumer removed");
      Ok(Locked::Done(remaining))
    })
  }

  /// Queues a message published to `exchange` with `routing_key` would reach.
  ///
  /// The default exchange routes to the queue named by `routing_key`, if it exists.
  pub fn route(&self, exchange: &str, routing_key: &str) -> Result<BTreeSet<String>, BrokerError> {
    self.ensure_open()?;
    let topology = read(&self.inner.topology);
    self.destinations(&topology, exchange, routing_key)
  }

  fn destinations(
    &self,
    topology: &Topology,
    exchange: &str,
    routing_key: &str,
  ) -> Result<BTreeSet<String>, BrokerError> {
    let record = topology
      .registry
      .exchange(exchange)
      .ok_or_else(|| BrokerError::no_exchange(exchange))?;

    if exchange == DEFAULT_EXCHANGE {
      return Ok(if topology.registry.contains_queue(routing_key) {
        BTreeSet::from([routing_key.to_string()])
      } else {
        BTreeSet::new()
      });
    }
    let mut queues = self
      .inner
      .matcher
      .route(record.def.kind, &topology.bindings.for_exchange(exchange), routing_key);
    queues.retain(|queue| topology.registry.contains_queue(queue));
    Ok(queues)
  }

  /// Route a message through `exchange` and store it on every destination queue.
  ///
  /// Returns the number of queues the message reached.
  pub fn publish(&self, exchange: &str, routing_key: &str, payload: impl Into<Vec<u8>>) -> Result<usize, BrokerError> {
    self.ensure_open()?;

    // Held while storing, so a concurrent delete cannot slip between routing and push.
    let topology = read(&self.inner.topology);
    let destinations = self.destinations(&topology, exchange, routing_key)?;

    let message = Message {
      exchange: exchange.to_string(),
      routing_key: routing_key.to_string(),
      payload: payload.into(),
    };
    for queue in &destinations {
      self.inner.store.push(queue, message.clone());
    }

    let routed = destinations.len();
    trace!(exchange = %exchange, routing_key = %routing_key, routed, "message published");
    Ok(routed)
  }

  /// Fetch the oldest pending message of `queue`.
  pub fn get(&self, queue: &str) -> Result<Option<Message>, BrokerError> {
    self.get_as(ConnectionId::ADMIN, queue)
  }

  pub(super) fn get_as(&self, conn: ConnectionId, queue: &str) -> Result<Option<Message>, BrokerError> {
    self.ensure_open()?;
    let topology = read(&self.inner.topology);
    let record = topology
      .registry
      .queue(queue)
      .ok_or_else(|| BrokerError::no_queue(queue))?;
    if !record.accessible_by(conn) {
      return Err(BrokerError::ResourceLocked(EntityKey::queue(queue)));
    }
    Ok(self.inner.store.pop(queue))
  }
}
