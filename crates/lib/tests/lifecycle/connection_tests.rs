use warren_lib::{ErrorKind, ExchangeKind, QueueOptions};

use super::common::*;

fn exclusive() -> QueueOptions {
  QueueOptions {
    exclusive: true,
    ..QueueOptions::default()
  }
}

#[test]
fn connection_drop_cascades_to_auto_delete_exchange() {
  let (broker, _journal) = memory_broker();
  broker
    .declare_exchange(X, ExchangeKind::Topic, auto_delete_exchange(false))
    .unwrap();

  {
    let conn = broker.connect();
    let ch = conn.channel();
    let ok = ch.declare_queue("", exclusive()).unwrap();
    assert!(ok.queue.starts_with("amq.gen-"));
    ch.bind(&ok.queue, X, "#").unwrap();
    assert!(delivers(&broker, X, "any.key", &ok.queue));
  }

  assert!(broker.queues().is_empty());
  assert!(broker.exchange(X).is_none());
}

#[test]
fn channel_drop_cancels_consumers_and_auto_deletes() {
  let (broker, _journal) = memory_broker();
  broker.declare_queue(Q, auto_delete_queue(false)).unwrap();

  let conn = broker.connect();
  let keep = conn.channel();
  keep.consume(Q).unwrap();
  {
    let ch = conn.channel();
    ch.consume(Q).unwrap();
    assert_eq!(broker.consumer_count(Q), 2);
  }
  assert_eq!(broker.consumer_count(Q), 1);
  assert!(broker.queue(Q).is_some());

  keep.close().unwrap();
  assert!(broker.queue(Q).is_none());
}

#[test]
fn other_connection_is_locked_out() {
  let (broker, _journal) = memory_broker();
  let owner = broker.connect();
  let intruder = broker.connect();
  owner.channel().declare_queue(Q, exclusive()).unwrap();

  let ch = intruder.channel();
  assert_eq!(ch.consume(Q).unwrap_err().kind(), ErrorKind::ResourceLocked);
  assert_eq!(ch.unbind(Q, "amq.direct", K).unwrap_err().kind(), ErrorKind::ResourceLocked);

  drop(ch);
  drop(intruder);
  assert!(broker.queue(Q).is_some());
  drop(owner);
  assert!(broker.queue(Q).is_none());
}

#[test]
fn connections_after_shutdown_release_quietly() {
  let (broker, _journal) = memory_broker();
  let conn = broker.connect();
  let ch = conn.channel();
  ch.declare_queue(Q, exclusive()).unwrap();
  ch.consume(Q).unwrap();
  broker.shutdown().unwrap();
  assert_eq!(ch.declare_queue("other", QueueOptions::default()).unwrap_err().kind(), ErrorKind::Closed);
  drop(ch);
  drop(conn);
}
