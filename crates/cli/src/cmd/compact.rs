use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;

use warren_lib::Broker;

use crate::output::{OutputFormat, print_json, print_stat, print_success};

pub fn cmd_compact(broker: &Broker, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  broker.compact().context("Compaction failed")?;
  let elapsed = start.elapsed();

  let exchanges = broker.exchanges().iter().filter(|x| x.def.durable && !x.builtin).count();
  let queues = broker.queues().iter().filter(|q| q.def.persistent()).count();

  if output.is_json() {
    print_json(&json!({ "durable_exchanges": exchanges, "durable_queues": queues, "elapsed_ms": elapsed.as_millis() }))?;
  } else {
    print_success("Journal compacted");
    print_stat("Durable exchanges", &exchanges.to_string());
    print_stat("Durable queues", &queues.to_string());
    print_stat("Duration", &format!("{}ms", elapsed.as_millis()));
  }
  Ok(())
}
