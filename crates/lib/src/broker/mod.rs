//! Lifecycle coordinator.
//!
//! [`Broker`] sequences declarations, deletions, binds and unbinds against the entity
//! registry, binding table and reference tracker, and journals every durable change.
//! It handles:
//! - Per-entity operation locking, so independent names proceed in parallel
//! - Cascading removal of bindings when a queue or exchange goes away
//! - Auto-delete evaluation as a bounded work list
//! - All-or-nothing commits: plan under locks, journal, then apply
//! - Replay of the journal before the handle is returned
//!
//! # Submodules
//!
//! - `declare` - exchange and queue declaration
//! - `bindings` - bind and unbind
//! - `delete` - explicit deletion and purge
//! - `consume` - consumer hooks, publish and fetch
//! - `cascade` - removal planning and commit
//! - `connection` - connections, channels and exclusive ownership
//! - `locks` - operation-level entity locks

mod bindings;
mod cascade;
mod connection;
mod consume;
mod declare;
mod delete;
mod locks;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{info, warn};

use crate::binding::{Binding, BindingTable};
use crate::config::BrokerConfig;
use crate::consts::is_builtin_exchange;
use crate::entity::{ConnectionId, EntityRegistry, Exchange, Queue};
use crate::error::BrokerError;
use crate::journal::{DurableState, Journal, JournalOp};
use crate::messages::{MemoryStore, MessageStore};
use crate::refs::ReferenceTracker;
use crate::routing::{KeyMatcher, Matcher};
use crate::util::sync::{lock, read};

use locks::EntityLocks;

pub use connection::{Channel, Connection, ConsumerTag};
pub use declare::{ExchangeOptions, QueueDeclareOk, QueueOptions};

/// Everything the coordinator mutates, behind one short-lived lock.
///
/// The lock is held for one read or one commit at a time. Operation-level exclusion comes
/// from [`EntityLocks`].
#[derive(Debug, Default)]
pub(crate) struct Topology {
  pub registry: EntityRegistry,
  pub bindings: BindingTable,
  pub refs: ReferenceTracker,
}

impl Topology {
  /// Rebuild the durable part of the topology from replayed journal state.
  fn restore(state: &DurableState) -> Self {
    let mut topology = Topology::default();

    for def in state.exchanges.values() {
      if is_builtin_exchange(&def.name) {
        warn!(exchange = %def.name, "ignoring journaled declaration of built-in exchange");
        continue;
      }
      topology.registry.insert_exchange(Exchange::new(def.clone()));
    }
    for def in state.queues.values() {
      topology.registry.insert_queue(Queue::new(def.clone(), None));
    }
    for binding in &state.bindings {
      if topology.bindings.insert(binding.clone()) {
        topology.refs.binding_added(&binding.exchange);
      }
    }

    topology
  }
}

#[derive(Debug)]
struct BrokerInner {
  config: BrokerConfig,
  topology: RwLock<Topology>,
  /// `None` once the broker has been shut down.
  journal: Mutex<Option<Journal>>,
  locks: EntityLocks,
  matcher: Arc<dyn Matcher>,
  store: Arc<dyn MessageStore>,
  custom_store: bool,
  closed: AtomicBool,
  next_connection: AtomicU64,
}

/// Handle to a running broker. Clones share the same state.
#[derive(Debug, Clone)]
pub struct Broker {
  inner: Arc<BrokerInner>,
}

/// Configures collaborators before a broker is opened.
#[derive(Debug)]
pub struct BrokerBuilder {
  config: BrokerConfig,
  matcher: Option<Arc<dyn Matcher>>,
  store: Option<Arc<dyn MessageStore>>,
}

impl BrokerBuilder {
  /// Route publishes with `matcher` instead of [`KeyMatcher`].
  pub fn matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
    self.matcher = Some(matcher);
    self
  }

  /// Keep messages in `store` instead of a fresh [`MemoryStore`].
  ///
  /// A custom store is handed over unchanged on [`Broker::restart`].
  pub fn store(mut self, store: Arc<dyn MessageStore>) -> Self {
    self.store = Some(store);
    self
  }

  /// Replay the journal and return a ready broker.
  ///
  /// No operation can reach the broker before replay has finished: the handle does not
  /// exist until then.
  pub fn open(self) -> Result<Broker, BrokerError> {
    let backend = self.config.journal.open()?;
    let journal = Journal::open(backend, self.config.compact_after)?;
    let topology = Topology::restore(journal.state());

    info!(
      exchanges = topology.registry.exchanges().len(),
      queues = topology.registry.queues().len(),
      bindings = topology.bindings.len(),
      "broker ready"
    );

    let custom_store = self.store.is_some();
    Ok(Broker {
      inner: Arc::new(BrokerInner {
        config: self.config,
        topology: RwLock::new(topology),
        journal: Mutex::new(Some(journal)),
        locks: EntityLocks::new(),
        matcher: self.matcher.unwrap_or_else(|| Arc::new(KeyMatcher)),
        store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
        custom_store,
        closed: AtomicBool::new(false),
        next_connection: AtomicU64::new(ConnectionId::ADMIN.0 + 1),
      }),
    })
  }
}

impl Broker {
  pub fn builder(config: BrokerConfig) -> BrokerBuilder {
    BrokerBuilder {
      config,
      matcher: None,
      store: None,
    }
  }

  /// Open a broker with the default matcher and message store.
  pub fn open(config: BrokerConfig) -> Result<Self, BrokerError> {
    Self::builder(config).open()
  }

  /// Flush the journal and stop accepting operations.
  ///
  /// Every later operation, on this handle or any clone, fails with
  /// [`BrokerError::Closed`]. Calling it twice is harmless.
  pub fn shutdown(&self) -> Result<(), BrokerError> {
    if self.inner.closed.swap(true, Ordering::SeqCst) {
      return Ok(());
    }
    let journal = lock(&self.inner.journal).take();
    if let Some(mut journal) = journal {
      journal.sync()?;
    }
    info!("broker shut down");
    Ok(())
  }

  /// Shut down and reopen with the same configuration and collaborators.
  ///
  /// Only journaled state survives. Message contents survive only with a custom store.
  pub fn restart(self) -> Result<Broker, BrokerError> {
    self.shutdown()?;
    let inner = &self.inner;
    let mut builder = Broker::builder(inner.config.clone()).matcher(Arc::clone(&inner.matcher));
    if inner.custom_store {
      builder = builder.store(Arc::clone(&inner.store));
    }
    info!("broker restarting");
    builder.open()
  }

  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::SeqCst)
  }

  pub fn config(&self) -> &BrokerConfig {
    &self.inner.config
  }

  /// Rewrite the journal to the minimal form of the current durable state.
  pub fn compact(&self) -> Result<(), BrokerError> {
    let mut journal = lock(&self.inner.journal);
    let journal = journal.as_mut().ok_or(BrokerError::Closed)?;
    journal.compact()?;
    Ok(())
  }

  pub fn exchange(&self, name: &str) -> Option<Exchange> {
    read(&self.inner.topology).registry.exchange(name).cloned()
  }

  pub fn queue(&self, name: &str) -> Option<Queue> {
    read(&self.inner.topology).registry.queue(name).cloned()
  }

  /// All live exchanges, built-ins included, sorted by name.
  pub fn exchanges(&self) -> Vec<Exchange> {
    read(&self.inner.topology)
      .registry
      .exchanges()
      .into_iter()
      .cloned()
      .collect()
  }

  /// All live queues, sorted by name.
  pub fn queues(&self) -> Vec<Queue> {
    read(&self.inner.topology)
      .registry
      .queues()
      .into_iter()
      .cloned()
      .collect()
  }

  /// Every explicit binding, sorted. Implicit default-exchange routes are not listed.
  pub fn bindings(&self) -> Vec<Binding> {
    read(&self.inner.topology).bindings.iter().collect()
  }

  pub fn bindings_for_exchange(&self, exchange: &str) -> Vec<Binding> {
    read(&self.inner.topology).bindings.for_exchange(exchange)
  }

  pub fn bindings_for_queue(&self, queue: &str) -> Vec<Binding> {
    read(&self.inner.topology).bindings.for_queue(queue)
  }

  pub fn consumer_count(&self, queue: &str) -> u32 {
    read(&self.inner.topology).refs.consumers(queue)
  }

  pub fn message_count(&self, queue: &str) -> u32 {
    self.inner.store.message_count(queue)
  }

  fn ensure_open(&self) -> Result<(), BrokerError> {
    if self.is_closed() {
      return Err(BrokerError::Closed);
    }
    Ok(())
  }

  /// Append one journal entry. Empty `ops` write nothing.
  fn record(&self, ops: Vec<JournalOp>) -> Result<(), BrokerError> {
    let mut journal = lock(&self.inner.journal);
    let journal = journal.as_mut().ok_or(BrokerError::Closed)?;
    journal.record(ops)?;
    Ok(())
  }

  fn next_connection_id(&self) -> ConnectionId {
    ConnectionId(self.inner.next_connection.fetch_add(1, Ordering::Relaxed))
  }
}
