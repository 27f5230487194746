//! Status command implementation.
//!
//! Lists the exchanges, queues and bindings recovered from the journal.

use anyhow::Result;
use serde::Serialize;

use warren_lib::{Binding, Broker, Exchange, JournalConfig, Queue};

use crate::output::{OutputFormat, display_name, format_flags, print_info, print_json, print_stat, print_success, symbols};

#[derive(Debug, Serialize)]
struct StatusReport {
  data_dir: Option<String>,
  exchanges: Vec<Exchange>,
  queues: Vec<Queue>,
  bindings: Vec<Binding>,
}

/// Print the broker topology.
///
/// Built-in exchanges are listed only with `verbose`.
pub fn cmd_status(broker: &Broker, verbose: bool, output: OutputFormat) -> Result<()> {
  let data_dir = match &broker.config().journal {
    JournalConfig::File { dir, .. } => Some(dir.display().to_string()),
    JournalConfig::Memory(_) => None,
  };
  let exchanges: Vec<Exchange> = broker
    .exchanges()
    .into_iter()
    .filter(|x| verbose || !x.builtin)
    .collect();

  let report = StatusReport {
    data_dir,
    exchanges,
    queues: broker.queues(),
    bindings: broker.bindings(),
  };

  if output.is_json() {
    return print_json(&report);
  }

  match &report.data_dir {
    Some(dir) => print_success(&format!("Broker data at {}", dir)),
    None => print_success("In-memory broker"),
  }
  print_stat("Exchanges", &report.exchanges.len().to_string());
  print_stat("Queues", &report.queues.len().to_string());
  print_stat("Bindings", &report.bindings.len().to_string());

  if report.exchanges.is_empty() && report.queues.is_empty() {
    println!();
    print_info("No exchanges or queues declared.");
    return Ok(());
  }

  if !report.exchanges.is_empty() {
    println!();
    println!("Exchanges:");
    for x in &report.exchanges {
      let flags = format_flags(&[
        ("durable", x.def.durable),
        ("auto-delete", x.def.auto_delete),
        ("built-in", x.builtin),
      ]);
      println!("  {} {} [{}] ({})", symbols::INFO, display_name(x.name()), x.def.kind, flags);
    }
  }

  if !report.queues.is_empty() {
    println!();
    println!("Queues:");
    for q in &report.queues {
      let flags = format_flags(&[("durable", q.def.durable), ("auto-delete", q.def.auto_delete)]);
      println!("  {} {} ({})", symbols::INFO, q.name(), flags);
    }
  }

  if !report.bindings.is_empty() {
    println!();
    println!("Bindings:");
    for b in &report.bindings {
      println!(
        "  {} {} {} {} (key '{}')",
        symbols::INFO,
        b.exchange,
        symbols::ARROW,
        b.queue,
        b.routing_key
      );
    }
  }

  Ok(())
}
