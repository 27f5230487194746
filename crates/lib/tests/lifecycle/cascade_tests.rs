use warren_lib::{ErrorKind, ExchangeKind, ExchangeOptions};

use super::common::*;

fn transient_setup(broker: &warren_lib::Broker) {
  broker
    .declare_exchange(X, ExchangeKind::Direct, ExchangeOptions::default())
    .unwrap();
  transient_queue(broker, Q);
  broker.bind(Q, X, K).unwrap();
}

#[test]
fn deleted_queue_binding_does_not_resurrect() {
  let (broker, _journal) = memory_broker();
  transient_setup(&broker);
  assert!(delivers(&broker, X, K, Q));

  broker.delete_queue(Q, false, false).unwrap();
  transient_queue(&broker, Q);
  assert!(!delivers(&broker, X, K, Q));
}

#[test]
fn deleted_exchange_binding_does_not_resurrect() {
  let (broker, _journal) = memory_broker();
  transient_setup(&broker);

  broker.delete_exchange(X, false).unwrap();
  broker
    .declare_exchange(X, ExchangeKind::Direct, ExchangeOptions::default())
    .unwrap();
  assert!(!delivers(&broker, X, K, Q));
}

#[test]
fn exchange_if_unused_waits_for_last_binding() {
  let (broker, _journal) = memory_broker();
  transient_setup(&broker);

  let err = broker.delete_exchange(X, true).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
  assert!(broker.exchange(X).is_some());

  broker.unbind(Q, X, K).unwrap();
  broker.delete_exchange(X, true).unwrap();
  assert!(broker.exchange(X).is_none());
}

#[test]
fn purge_empties_queue_and_keeps_bindings() {
  let (broker, _journal) = memory_broker();
  transient_setup(&broker);

  broker.publish(X, K, "first").unwrap();
  assert_eq!(broker.purge_queue(Q).unwrap(), 1);
  assert!(broker.get(Q).unwrap().is_none());
  assert!(delivers(&broker, X, K, Q));
}

#[test]
fn journal_failure_leaves_cascade_unapplied() {
  let (broker, journal) = memory_broker();
  durable_setup(&broker);

  journal.fail_writes(true);
  let err = broker.delete_queue(Q, false, false).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Internal);
  assert_eq!(err.reply_code(), 541);
  assert!(broker.queue(Q).is_some());
  assert_eq!(broker.bindings().len(), 1);

  journal.fail_writes(false);
  broker.delete_queue(Q, false, false).unwrap();
  assert!(broker.bindings().is_empty());
}

#[test]
fn queue_delete_cascades_into_auto_delete_exchanges_only() {
  let (broker, _journal) = memory_broker();
  broker
    .declare_exchange("plain", ExchangeKind::Fanout, ExchangeOptions::default())
    .unwrap();
  broker
    .declare_exchange("ad", ExchangeKind::Fanout, auto_delete_exchange(false))
    .unwrap();
  transient_queue(&broker, Q);
  broker.bind(Q, "plain", "").unwrap();
  broker.bind(Q, "ad", "").unwrap();

  broker.delete_queue(Q, false, false).unwrap();
  assert!(broker.exchange("plain").is_some());
  assert!(broker.exchange("ad").is_none());
  assert!(broker.bindings().is_empty());
}
