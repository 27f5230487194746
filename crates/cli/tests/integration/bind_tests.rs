use predicates::prelude::*;

use super::common::TestEnv;

fn setup(env: &TestEnv) {
  env.run(&["exchange", "declare", "logs", "--type", "topic"]);
  env.run(&["queue", "declare", "errors"]);
  env.run(&["bind", "errors", "logs", "*.error"]);
}

#[test]
fn binding_routes_after_restart() {
  let env = TestEnv::new();
  setup(&env);

  env
    .warren_cmd()
    .args(["route", "logs", "db.error"])
    .assert()
    .success()
    .stdout(predicate::str::contains("→ errors"));

  env
    .warren_cmd()
    .args(["route", "logs", "db.info"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No queue would receive"));
}

#[test]
fn bind_is_idempotent() {
  let env = TestEnv::new();
  setup(&env);
  env.run(&["bind", "errors", "logs", "*.error"]);
  assert_eq!(env.binding_count(), 1);
}

#[test]
fn unbind_missing_binding_is_not_found() {
  let env = TestEnv::new();
  setup(&env);

  env
    .warren_cmd()
    .args(["unbind", "errors", "logs", "*.warn"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no binding"))
    .stderr(predicate::str::contains("reply code 404"));

  env.run(&["unbind", "errors", "logs", "*.error"]);
  assert_eq!(env.binding_count(), 0);
}

#[test]
fn unbind_last_binding_auto_deletes_exchange() {
  let env = TestEnv::new();
  env.run(&["exchange", "declare", "events", "--type", "fanout", "--auto-delete"]);
  env.run(&["queue", "declare", "audit"]);
  env.run(&["bind", "audit", "events"]);

  env
    .warren_cmd()
    .args(["unbind", "audit", "events"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Exchange 'events' auto-deleted"));

  assert!(env.exchange_names().is_empty());
  assert_eq!(env.queue_names(), ["audit"]);
}

#[test]
fn default_exchange_routes_by_queue_name() {
  let env = TestEnv::new();
  env.run(&["queue", "declare", "jobs"]);

  env
    .warren_cmd()
    .args(["route", "", "jobs"])
    .assert()
    .success()
    .stdout(predicate::str::contains("→ jobs"));

  env
    .warren_cmd()
    .args(["bind", "jobs", "", "jobs"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("reply code 403"));
}

#[test]
fn bind_to_builtin_exchange_persists() {
  let env = TestEnv::new();
  env.run(&["queue", "declare", "q"]);
  env.run(&["bind", "q", "amq.direct", "k"]);

  env
    .warren_cmd()
    .args(["route", "amq.direct", "k", "-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""q""#));
}
