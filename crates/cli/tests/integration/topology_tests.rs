use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn durable_declarations_persist_between_invocations() {
  let env = TestEnv::new();

  env.run(&["exchange", "declare", "logs", "--type", "topic"]);
  env.run(&["queue", "declare", "errors"]);

  assert_eq!(env.exchange_names(), ["logs"]);
  assert_eq!(env.queue_names(), ["errors"]);
}

#[test]
fn transient_declarations_vanish_with_the_process() {
  let env = TestEnv::new();

  env.run(&["exchange", "declare", "scratch", "--transient"]);
  env.run(&["queue", "declare", "tmp", "--transient"]);

  assert!(env.exchange_names().is_empty());
  assert!(env.queue_names().is_empty());
}

#[test]
fn redeclare_with_other_type_conflicts() {
  let env = TestEnv::new();
  env.run(&["exchange", "declare", "logs", "--type", "topic"]);

  env
    .warren_cmd()
    .args(["exchange", "declare", "logs", "--type", "fanout"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("✗"))
    .stderr(predicate::str::contains("inequivalent arguments"))
    .stderr(predicate::str::contains("reply code 406"));
}

#[test]
fn passive_declare_of_missing_queue_fails() {
  let env = TestEnv::new();

  env
    .warren_cmd()
    .args(["queue", "declare", "ghost", "--passive"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("reply code 404"));
}

#[test]
fn reserved_names_are_refused() {
  let env = TestEnv::new();

  env
    .warren_cmd()
    .args(["exchange", "declare", "amq.custom"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("reply code 403"));
}

#[test]
fn generated_queue_name_is_reported() {
  let env = TestEnv::new();

  env
    .warren_cmd()
    .args(["queue", "declare", "-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("amq.gen-"));
  assert_eq!(env.queue_names().len(), 1);
}

#[test]
fn builtin_exchange_delete_is_refused() {
  let env = TestEnv::new();

  env
    .warren_cmd()
    .args(["exchange", "delete", "amq.direct"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("built in"));
}

#[test]
fn queue_delete_removes_its_bindings() {
  let env = TestEnv::new();
  env.run(&["exchange", "declare", "x"]);
  env.run(&["queue", "declare", "q"]);
  env.run(&["bind", "q", "x", "k"]);

  env
    .warren_cmd()
    .args(["queue", "delete", "q"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Queue 'q' deleted"));

  assert_eq!(env.binding_count(), 0);
  assert_eq!(env.exchange_names(), ["x"]);
}

#[test]
fn exchange_delete_if_unused() {
  let env = TestEnv::new();
  env.run(&["exchange", "declare", "x"]);
  env.run(&["queue", "declare", "q"]);
  env.run(&["bind", "q", "x", "k"]);

  env
    .warren_cmd()
    .args(["exchange", "delete", "x", "--if-unused"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("reply code 406"));

  env.run(&["exchange", "delete", "x"]);
  assert!(env.exchange_names().is_empty());
  assert_eq!(env.queue_names(), ["q"]);
  assert_eq!(env.binding_count(), 0);
}
