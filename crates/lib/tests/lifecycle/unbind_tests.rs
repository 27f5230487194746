use tracing_test::traced_test;
use warren_lib::{ErrorKind, ExchangeKind};

use super::common::*;

const BOUND: &str = "amq.direct";

#[test]
#[traced_test]
fn unbind_missing_parts_is_not_found() {
  let (broker, _journal) = memory_broker();
  durable_queue(&broker, Q);
  broker.bind(Q, BOUND, K).unwrap();

  let cases = [
    ("missing-queue", BOUND, K),
    (Q, "missing-exchange", K),
    ("missing-queue", "missing-exchange", K),
    (Q, BOUND, "wrong-key"),
    ("missing-queue", "missing-exchange", "wrong-key"),
  ];
  for (queue, exchange, key) in cases {
    let err = broker.unbind(queue, exchange, key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{queue} {exchange} {key}");
    assert_eq!(err.reply_code(), 404);
  }
  assert_eq!(broker.bindings().len(), 1);

  broker.unbind(Q, BOUND, K).unwrap();
  assert!(broker.bindings().is_empty());
  assert!(logs_contain("queue unbound"));
}

#[test]
fn unbind_of_durable_binding_survives_restart() {
  let (broker, _journal) = memory_broker();
  durable_exchange(&broker, X, ExchangeKind::Topic);
  durable_queue(&broker, Q);
  broker.bind(Q, X, "a.*").unwrap();
  broker.bind(Q, X, "b.#").unwrap();
  broker.unbind(Q, X, "a.*").unwrap();

  let broker = broker.restart().unwrap();
  assert!(!delivers(&broker, X, "a.one", Q));
  assert!(delivers(&broker, X, "b.one.two", Q));
}

#[test]
fn idempotent_bind_then_single_unbind() {
  let (broker, _journal) = memory_broker();
  durable_setup(&broker);
  broker.bind(Q, X, K).unwrap();
  assert_eq!(broker.bindings().len(), 1);
  broker.unbind(Q, X, K).unwrap();
  assert_eq!(broker.unbind(Q, X, K).unwrap_err().kind(), ErrorKind::NotFound);
}
