//! Implementation of the `warren bind` and `warren unbind` commands.

use anyhow::Result;

use warren_lib::{Binding, Broker};

use crate::output::{OutputFormat, print_json, print_success};

pub fn cmd_bind(broker: &Broker, queue: &str, exchange: &str, routing_key: &str, output: OutputFormat) -> Result<()> {
  broker.bind(queue, exchange, routing_key)?;
  report("Bound", Binding::new(queue, exchange, routing_key), output)
}

/// Remove a binding. An auto-delete exchange losing its last binding is deleted with it.
pub fn cmd_unbind(broker: &Broker, queue: &str, exchange: &str, routing_key: &str, output: OutputFormat) -> Result<()> {
  broker.unbind(queue, exchange, routing_key)?;
  report("Unbound", Binding::new(queue, exchange, routing_key), output)?;
  if !output.is_json() && broker.exchange(exchange).is_none() {
    print_success(&format!("Exchange '{}' auto-deleted", exchange));
  }
  Ok(())
}

fn report(verb: &str, binding: Binding, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    print_json(&binding)
  } else {
    print_success(&format!("{} {}", verb, binding));
    Ok(())
  }
}
