use anyhow::Result;
use serde_json::json;

use warren_lib::Broker;

use crate::output::{OutputFormat, display_name, print_info, print_json, symbols};

/// Show the queues a message published to `exchange` with `routing_key` would reach.
///
/// Nothing is published.
pub fn cmd_route(broker: &Broker, exchange: &str, routing_key: &str, output: OutputFormat) -> Result<()> {
  let queues = broker.route(exchange, routing_key)?;

  if output.is_json() {
    return print_json(&json!({ "exchange": exchange, "routing_key": routing_key, "queues": queues }));
  }

  if queues.is_empty() {
    print_info(&format!(
      "No queue would receive '{}' on {}",
      routing_key,
      display_name(exchange)
    ));
    return Ok(());
  }
  for queue in &queues {
    println!("{} {}", symbols::ARROW, queue);
  }
  Ok(())
}
