use std::fs::{self, OpenOptions};
use std::io::Write;

use tracing_test::traced_test;
use warren_lib::config::BrokerConfig;
use warren_lib::{Broker, ErrorKind};

use super::common::*;

fn journal_lines(dir: &std::path::Path) -> Vec<String> {
  fs::read_to_string(dir.join("journal.jsonl"))
    .unwrap()
    .lines()
    .map(str::to_string)
    .collect()
}

#[test]
#[traced_test]
fn torn_tail_is_dropped() {
  let dir = tempfile::tempdir().unwrap();
  let broker = file_broker(dir.path());
  durable_setup(&broker);
  broker.shutdown().unwrap();
  drop(broker);

  let mut file = OpenOptions::new()
    .append(true)
    .open(dir.path().join("journal.jsonl"))
    .unwrap();
  file.write_all(br#"{"seq":99,"ops":[{"op":"delete_qu"#).unwrap();
  drop(file);

  let broker = file_broker(dir.path());
  assert!(broker.queue(Q).is_some());
  assert!(delivers(&broker, X, K, Q));
  assert!(logs_contain("dropping torn journal tail"));
}

#[test]
fn corruption_before_tail_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let broker = file_broker(dir.path());
  durable_setup(&broker);
  broker.shutdown().unwrap();
  drop(broker);

  let mut lines = journal_lines(dir.path());
  lines.insert(1, "not json".to_string());
  fs::write(dir.path().join("journal.jsonl"), lines.join("\n") + "\n").unwrap();

  let err = Broker::open(BrokerConfig::file(dir.path())).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Internal);
  assert!(err.to_string().contains("corrupt journal at line 2"), "{err}");
}

#[test]
fn unknown_version_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("journal.jsonl"), "{\"version\":99}\n").unwrap();
  let err = Broker::open(BrokerConfig::file(dir.path())).unwrap_err();
  assert!(err.to_string().contains("unsupported journal version: 99"), "{err}");
}

#[test]
fn second_broker_on_same_directory_is_refused() {
  let dir = tempfile::tempdir().unwrap();
  let first = file_broker(dir.path());
  let err = Broker::open(BrokerConfig::file(dir.path())).unwrap_err();
  assert!(err.to_string().contains("already open in this process"), "{err}");

  first.shutdown().unwrap();
  Broker::open(BrokerConfig::file(dir.path())).unwrap();
}

#[test]
#[traced_test]
fn reopen_compacts_to_one_entry() {
  let dir = tempfile::tempdir().unwrap();
  let broker = file_broker(dir.path());
  durable_setup(&broker);
  for i in 0..20 {
    let queue = format!("tmp{}", i);
    durable_queue(&broker, &queue);
    broker.delete_queue(&queue, false, false).unwrap();
  }
  assert!(journal_lines(dir.path()).len() > 40);

  let broker = broker.restart().unwrap();
  let lines = journal_lines(dir.path());
  assert_eq!(lines.len(), 2, "header plus one compacted entry");
  assert!(lines[1].contains(r#""op":"bind""#));
  assert!(!lines[1].contains("tmp"));
  assert!(delivers(&broker, X, K, Q));
  assert!(logs_contain("journal replayed"));
}

#[test]
fn explicit_compaction_keeps_state() {
  let (broker, journal) = memory_broker();
  durable_setup(&broker);
  broker.unbind(Q, X, K).unwrap();
  broker.compact().unwrap();
  assert_eq!(journal.entries().len(), 1);

  let broker = broker.restart().unwrap();
  assert!(broker.bindings().is_empty());
  assert!(broker.queue(Q).is_some());
  assert!(broker.exchange(X).is_some());
}
