//! Shared helpers for lifecycle integration tests.

use std::path::Path;

use warren_lib::config::BrokerConfig;
use warren_lib::journal::{MemoryJournal, SyncPolicy};
use warren_lib::{Broker, ExchangeKind, ExchangeOptions, QueueOptions};

pub const X: &str = "x";
pub const Q: &str = "q";
pub const K: &str = "K";

/// Broker over a fresh in-memory journal. The journal handle survives restarts.
pub fn memory_broker() -> (Broker, MemoryJournal) {
  let journal = MemoryJournal::new();
  let broker = Broker::open(BrokerConfig::with_memory_journal(journal.clone())).unwrap();
  (broker, journal)
}

/// Broker journaling to `dir` without fsync, to keep tests fast.
pub fn file_broker(dir: &Path) -> Broker {
  let mut config = BrokerConfig::file(dir);
  if let warren_lib::JournalConfig::File { sync, .. } = &mut config.journal {
    *sync = SyncPolicy::Never;
  }
  Broker::open(config).unwrap()
}

pub fn durable_exchange(broker: &Broker, name: &str, kind: ExchangeKind) {
  broker.declare_exchange(name, kind, ExchangeOptions::durable()).unwrap();
}

pub fn durable_queue(broker: &Broker, name: &str) {
  broker.declare_queue(name, QueueOptions::durable()).unwrap();
}

pub fn transient_queue(broker: &Broker, name: &str) {
  broker.declare_queue(name, QueueOptions::default()).unwrap();
}

pub fn auto_delete_exchange(durable: bool) -> ExchangeOptions {
  ExchangeOptions {
    durable,
    auto_delete: true,
    passive: false,
  }
}

pub fn auto_delete_queue(durable: bool) -> QueueOptions {
  QueueOptions {
    durable,
    auto_delete: true,
    ..QueueOptions::default()
  }
}

/// Durable direct exchange `X`, durable queue `Q`, bound with `K`.
pub fn durable_setup(broker: &Broker) {
  durable_exchange(broker, X, ExchangeKind::Direct);
  durable_queue(broker, Q);
  broker.bind(Q, X, K).unwrap();
}

/// Publish a marker through `exchange` and report whether `queue` received it.
pub fn delivers(broker: &Broker, exchange: &str, routing_key: &str, queue: &str) -> bool {
  while broker.get(queue).unwrap().is_some() {}
  broker.publish(exchange, routing_key, "marker").unwrap();
  broker.get(queue).unwrap().is_some_and(|m| m.payload == b"marker")
}
