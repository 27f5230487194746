use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn compact_keeps_durable_state() {
  let env = TestEnv::new();
  env.run(&["exchange", "declare", "x"]);
  env.run(&["queue", "declare", "q"]);
  env.run(&["bind", "q", "x", "k"]);
  env.run(&["queue", "declare", "gone"]);
  env.run(&["queue", "delete", "gone"]);

  env
    .warren_cmd()
    .arg("compact")
    .assert()
    .success()
    .stdout(predicate::str::contains("Journal compacted"))
    .stdout(predicate::str::contains("Durable queues: 1"));

  let journal = std::fs::read_to_string(env.journal_path()).unwrap();
  assert_eq!(journal.lines().count(), 2);
  assert!(!journal.contains("gone"));
  assert_eq!(env.binding_count(), 1);
}

#[test]
fn corrupt_journal_fails_to_open() {
  let env = TestEnv::new();
  env.run(&["queue", "declare", "a"]);
  env.run(&["queue", "declare", "b"]);

  let journal = std::fs::read_to_string(env.journal_path()).unwrap();
  let mut lines: Vec<&str> = journal.lines().collect();
  lines.insert(1, "{ broken");
  std::fs::write(env.journal_path(), lines.join("\n") + "\n").unwrap();

  env
    .warren_cmd()
    .arg("status")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to open broker"))
    .stderr(predicate::str::contains("corrupt journal"))
    .stderr(predicate::str::contains("reply code 541"));
}

#[test]
fn torn_tail_is_ignored() {
  let env = TestEnv::new();
  env.run(&["queue", "declare", "kept"]);

  let mut journal = std::fs::read_to_string(env.journal_path()).unwrap();
  journal.push_str(r#"{"seq":7,"ops":[{"op":"declare_q"#);
  std::fs::write(env.journal_path(), journal).unwrap();

  assert_eq!(env.queue_names(), ["kept"]);
}
