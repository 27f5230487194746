use std::collections::BTreeSet;

use warren_lib::{Broker, ErrorKind, ExchangeKind};

use super::common::*;

/// Auto-delete exchange `X` with `count` auto-delete queues bound to it, each with one
/// consumer.
fn auto_delete_topology(broker: &Broker, durable: bool, count: usize) -> Vec<String> {
  broker
    .declare_exchange(X, ExchangeKind::Direct, auto_delete_exchange(durable))
    .unwrap();
  (0..count)
    .map(|i| {
      let queue = format!("q{}", i);
      broker.declare_queue(&queue, auto_delete_queue(durable)).unwrap();
      broker.bind(&queue, X, K).unwrap();
      broker.consumer_added(&queue).unwrap();
      queue
    })
    .collect()
}

fn single_queue_removes_exchange(durable: bool) {
  let (broker, _journal) = memory_broker();
  let queues = auto_delete_topology(&broker, durable, 1);

  broker.consumer_removed(&queues[0]).unwrap();
  assert!(broker.queue(&queues[0]).is_none());
  assert!(broker.exchange(X).is_none());

  transient_queue(&broker, Q);
  let err = broker.bind(Q, X, K).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

fn many_queues_keep_exchange(durable: bool) {
  let (broker, _journal) = memory_broker();
  let queues = auto_delete_topology(&broker, durable, 10);

  broker.consumer_removed(&queues[0]).unwrap();
  assert!(broker.queue(&queues[0]).is_none());
  assert!(broker.exchange(X).is_some());
  assert_eq!(broker.bindings_for_exchange(X).len(), 9);

  for queue in &queues[1..] {
    broker.consumer_removed(queue).unwrap();
  }
  assert!(broker.exchange(X).is_none());
  assert!(broker.bindings().is_empty());
}

#[test]
fn auto_delete_exchange_with_one_queue() {
  single_queue_removes_exchange(false);
}

#[test]
fn durable_auto_delete_exchange_with_one_queue() {
  single_queue_removes_exchange(true);
}

#[test]
fn auto_delete_exchange_with_many_queues() {
  many_queues_keep_exchange(false);
}

#[test]
fn durable_auto_delete_exchange_with_many_queues() {
  let (broker, _journal) = memory_broker();
  broker
    .declare_exchange(X, ExchangeKind::Direct, auto_delete_exchange(true))
    .unwrap();
  broker.declare_queue(Q, auto_delete_queue(true)).unwrap();
  broker.bind(Q, X, K).unwrap();
  broker.consumer_added(Q).unwrap();
  let others: BTreeSet<String> = (1..10).map(|i| format!("q{}", i)).collect();
  for queue in &others {
    durable_queue(&broker, queue);
    broker.bind(queue, X, K).unwrap();
  }

  broker.consumer_removed(Q).unwrap();
  assert!(broker.queue(Q).is_none());
  assert!(broker.exchange(X).is_some());

  let broker = broker.restart().unwrap();
  assert!(broker.exchange(X).is_some());
  assert!(broker.queue(Q).is_none());
  assert_eq!(broker.route(X, K).unwrap(), others);
  assert!(delivers(&broker, X, K, "q9"));

  broker.declare_queue(Q, auto_delete_queue(true)).unwrap();
  broker.bind(Q, X, K).unwrap();
  assert_eq!(broker.route(X, K).unwrap().len(), 10);
}

#[test]
fn durable_auto_delete_is_journaled() {
  let (broker, _journal) = memory_broker();
  let queues = auto_delete_topology(&broker, true, 1);
  broker.consumer_removed(&queues[0]).unwrap();

  let broker = broker.restart().unwrap();
  assert!(broker.exchange(X).is_none());
  assert!(broker.queue(&queues[0]).is_none());
}

#[test]
fn auto_delete_exchange_without_bindings_is_kept() {
  let (broker, _journal) = memory_broker();
  broker
    .declare_exchange(X, ExchangeKind::Topic, auto_delete_exchange(false))
    .unwrap();
  transient_queue(&broker, Q);
  broker.consumer_added(Q).unwrap();
  broker.consumer_removed(Q).unwrap();
  assert!(broker.exchange(X).is_some());
}
