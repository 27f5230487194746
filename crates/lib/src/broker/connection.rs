//! Connections and channels.
//!
//! A [`Connection`] owns the exclusive queues declared through it and deletes them when it
//! closes. A [`Channel`] owns the consumers started on it and cancels them when it closes;
//! cancelling the last consumer of an auto-delete queue deletes the queue.
//!
//! Channels borrow their connection, so a connection always outlives its channels.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entity::{ConnectionId, ExchangeKind};
use crate::error::{BrokerError, ErrorKind};
use crate::messages::Message;
use crate::util::sync::{lock, read};

use super::cascade::Cause;
use super::{Broker, ExchangeOptions, QueueDeclareOk, QueueOptions};

/// Identifies one consumer on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConsumerTag(String);

impl ConsumerTag {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ConsumerTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl Broker {
  /// Open a client connection.
  pub fn connect(&self) -> Connection {
    let id = self.next_connection_id();
    debug!(connection = %id, "connection opened");
    Connection {
      broker: self.clone(),
      id,
      next_channel: AtomicU64::new(1),
      next_tag: AtomicU64::new(1),
      closed: AtomicBool::new(false),
    }
  }

  /// Delete every exclusive queue owned by `conn`. Returns how many were deleted.
  fn release_connection(&self, conn: ConnectionId) -> Result<usize, BrokerError> {
    let owned = read(&self.inner.topology).registry.queues_owned_by(conn);
    let mut deleted = 0;
    for queue in owned {
      match self.delete_queue_as(conn, &queue, false, false, Cause::OwnerClosed) {
        Ok(_) => deleted += 1,
        // Already gone through another path.
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
      }
    }
    Ok(deleted)
  }
}

pub struct Connection {
  broker: Broker,
  id: ConnectionId,
  next_channel: AtomicU64,
  next_tag: AtomicU64,
  closed: AtomicBool,
}

impl fmt::Debug for Connection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Connection").field("id", &self.id).finish_non_exhaustive()
  }
}

impl Connection {
  pub fn id(&self) -> ConnectionId {
    self.id
  }

  pub fn channel(&self) -> Channel<'_> {
    let id = self.next_channel.fetch_add(1, Ordering::Relaxed);
    Channel {
      connection: self,
      id,
      consumers: Mutex::new(BTreeMap::new()),
      closed: AtomicBool::new(false),
    }
  }

  /// Close the connection, deleting the exclusive queues it owns.
  pub fn close(self) -> Result<(), BrokerError> {
    self.shutdown()
  }

  fn shutdown(&self) -> Result<(), BrokerError> {
    if self.closed.swap(true, Ordering::SeqCst) {
      return Ok(());
    }
    if self.broker.is_closed() {
      return Ok(());
    }
    let deleted = self.broker.release_connection(self.id)?;
    info!(connection = %self.id, exclusive_queues = deleted, "connection closed");
    Ok(())
  }

  fn next_tag(&self, channel: u64) -> ConsumerTag {
    let n = self.next_tag.fetch_add(1, Ordering::Relaxed);
    ConsumerTag(format!("ctag-{}.{}-{}", self.id.0, channel, n))
  }
}

impl Drop for Connection {
  fn drop(&mut self) {
    if let Err(e) = self.shutdown() {
      warn!(connection = %self.id, error = %e, "failed to release connection resources");
    }
  }
}

/// A channel on a [`Connection`]. Operations run with the connection's identity.
pub struct Channel<'c> {
  connection: &'c Connection,
  id: u64,
  /// Queue name and incarnation each consumer was started on.
  consumers: Mutex<BTreeMap<ConsumerTag, (String, u64)>>,
  closed: AtomicBool,
}

impl fmt::Debug for Channel<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
      .field("connection", &self.connection.id)
      .field("id", &self.id)
      .finish_non_exhaustive()
  }
}

impl Channel<'_> {
  pub fn id(&self) -> u64 {
    self.id
  }

  fn broker(&self) -> &Broker {
    &self.connection.broker
  }

  fn conn(&self) -> ConnectionId {
    self.connection.id
  }

  pub fn declare_exchange(&self, name: &str, kind: ExchangeKind, options: ExchangeOptions) -> Result<(), BrokerError> {
    self.broker().declare_exchange(name, kind, options)
  }

  /// Declare a queue. An exclusive queue is owned by this channel's connection.
  pub fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<QueueDeclareOk, BrokerError> {
    self.broker().declare_queue_as(self.conn(), name, options)
  }

  pub fn bind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<(), BrokerError> {
    self.broker().bind_as(self.conn(), queue, exchange, routing_key)
  }

  pub fn unbind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<(), BrokerError> {
    self.broker().unbind_as(self.conn(), queue, exchange, routing_key)
  }

  pub fn delete_queue(&self, name: &str, if_unused: bool, if_empty: bool) -> Result<u32, BrokerError> {
    self
      .broker()
      .delete_queue_as(self.conn(), name, if_unused, if_empty, Cause::Requested)
  }

  pub fn delete_exchange(&self, name: &str, if_unused: bool) -> Result<(), BrokerError> {
    self.broker().delete_exchange(name, if_unused)
  }

  pub fn purge_queue(&self, name: &str) -> Result<u32, BrokerError> {
    self.broker().purge_queue_as(self.conn(), name)
  }

  pub fn publish(&self, exchange: &str, routing_key: &str, payload: impl Into<Vec<u8>>) -> Result<usize, BrokerError> {
    self.broker().publish(exchange, routing_key, payload)
  }

  pub fn get(&self, queue: &str) -> Result<Option<Message>, BrokerError> {
    self.broker().get_as(self.conn(), queue)
  }

  /// Start a consumer on `queue`.
  pub fn consume(&self, queue: &str) -> Result<ConsumerTag, BrokerError> {
    let (_, incarnation) = self.broker().consumer_added_as(self.conn(), queue)?;
    let tag = self.connection.next_tag(self.id);
    lock(&self.consumers).insert(tag.clone(), (queue.to_string(), incarnation));
    debug!(tag = %tag, queue = %queue, "consumer started");
    Ok(tag)
  }

  /// Cancel a consumer started on this channel.
  ///
  /// Cancelling a consumer whose queue has already been deleted succeeds, even if a queue
  /// of the same name has been declared since.
  pub fn cancel(&self, tag: &ConsumerTag) -> Result<(), BrokerError> {
    let (queue, incarnation) = lock(&self.consumers)
      .remove(tag)
      .ok_or_else(|| BrokerError::NotFound(format!("consumer '{}'", tag)))?;
    match self.broker().consumer_removed_from(&queue, Some(incarnation)) {
      Ok(_) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e),
    }
  }

  pub fn consumer_tags(&self) -> Vec<ConsumerTag> {
    lock(&self.consumers).keys().cloned().collect()
  }

  /// Close the channel, cancelling its consumers.
  pub fn close(self) -> Result<(), BrokerError> {
    self.shutdown()
  }

  fn shutdown(&self) -> Result<(), BrokerError> {
    if self.closed.swap(true, Ordering::SeqCst) || self.broker().is_closed() {
      return Ok(());
    }
    let consumers = std::mem::take(&mut *lock(&self.consumers));
    let cancelled = consumers.len();
    let mut first_error = None;
    for (queue, incarnation) in consumers.into_values() {
      match self.broker().consumer_removed_from(&queue, Some(incarnation)) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
          first_error.get_or_insert(e);
        }
      }
    }
    debug!(connection = %self.conn(), channel = self.id, cancelled, "channel closed");
    first_error.map_or(Ok(()), Err)
  }
}

impl Drop for Channel<'_> {
  fn drop(&mut self) {
    if let Err(e) = self.shutdown() {
      warn!(connection = %self.conn(), channel = self.id, error = %e, "failed to cancel channel consumers");
    }
  }
}
