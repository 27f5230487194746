use std::collections::BTreeSet;
use std::thread;

use warren_lib::{ExchangeKind, ExchangeOptions, QueueOptions};

use super::common::*;

const THREADS: usize = 8;
const PER_THREAD: usize = 25;

#[test]
fn independent_binds_from_many_threads() {
  let (broker, _journal) = memory_broker();

  thread::scope(|s| {
    for t in 0..THREADS {
      let broker = broker.clone();
      s.spawn(move || {
        let exchange = format!("x{}", t);
        broker
          .declare_exchange(&exchange, ExchangeKind::Direct, ExchangeOptions::durable())
          .unwrap();
        for i in 0..PER_THREAD {
          let queue = format!("q{}-{}", t, i);
          broker.declare_queue(&queue, QueueOptions::durable()).unwrap();
          broker.bind(&queue, &exchange, "k").unwrap();
        }
      });
    }
  });

  assert_eq!(broker.bindings().len(), THREADS * PER_THREAD);
  let broker = broker.restart().unwrap();
  assert_eq!(broker.bindings().len(), THREADS * PER_THREAD);
}

#[test]
fn same_tuple_bound_concurrently_once() {
  let (broker, _journal) = memory_broker();
  durable_setup(&broker);

  thread::scope(|s| {
    for _ in 0..THREADS {
      s.spawn(|| {
        for _ in 0..PER_THREAD {
          broker.bind(Q, X, K).unwrap();
        }
      });
    }
  });

  assert_eq!(broker.bindings().len(), 1);
}

#[test]
fn queue_churn_on_shared_exchange_leaves_no_dangling_bindings() {
  let (broker, _journal) = memory_broker();
  broker
    .declare_exchange("hub", ExchangeKind::Fanout, ExchangeOptions::default())
    .unwrap();

  thread::scope(|s| {
    for t in 0..THREADS {
      let broker = &broker;
      s.spawn(move || {
        let queue = format!("churn{}", t);
        for _ in 0..PER_THREAD {
          broker.declare_queue(&queue, QueueOptions::default()).unwrap();
          broker.bind(&queue, "hub", "").unwrap();
          broker.delete_queue(&queue, false, false).unwrap();
        }
      });
    }
    s.spawn(|| {
      for _ in 0..THREADS * PER_THREAD {
        broker.publish("hub", "", "tick").unwrap();
      }
    });
  });

  assert!(broker.bindings().is_empty());
  assert!(broker.queues().is_empty());
  assert!(broker.exchange("hub").is_some());
}

#[test]
fn concurrent_last_consumers_delete_shared_auto_delete_exchange() {
  let (broker, _journal) = memory_broker();
  broker
    .declare_exchange(X, ExchangeKind::Direct, auto_delete_exchange(true))
    .unwrap();
  let queues: Vec<String> = (0..THREADS).map(|i| format!("ad{}", i)).collect();
  for queue in &queues {
    broker.declare_queue(queue, auto_delete_queue(true)).unwrap();
    broker.bind(queue, X, K).unwrap();
    broker.consumer_added(queue).unwrap();
  }

  thread::scope(|s| {
    for queue in &queues {
      let broker = &broker;
      s.spawn(move || broker.consumer_removed(queue).unwrap());
    }
  });

  assert!(broker.queues().is_empty());
  assert!(broker.bindings().is_empty());
  assert!(broker.exchange(X).is_none());

  let broker = broker.restart().unwrap();
  assert!(broker.exchange(X).is_none());
}

#[test]
fn anonymous_queues_declared_concurrently_get_distinct_names() {
  let (broker, _journal) = memory_broker();

  let names: BTreeSet<String> = thread::scope(|s| {
    let handles: Vec<_> = (0..THREADS)
      .map(|_| {
        let broker = broker.clone();
        s.spawn(move || {
          (0..PER_THREAD)
            .map(|_| broker.declare_queue("", QueueOptions::default()).unwrap().queue)
            .collect::<Vec<_>>()
        })
      })
      .collect();
    handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
  });

  assert_eq!(names.len(), THREADS * PER_THREAD);
  assert_eq!(broker.queues().len(), THREADS * PER_THREAD);
}
