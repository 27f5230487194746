use std::str::FromStr;

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use warren_lib::{Broker, ExchangeKind, ExchangeOptions};

use crate::output::{OutputFormat, print_json, print_success};

#[derive(Subcommand, Debug)]
pub enum ExchangeCommand {
  /// Declare an exchange, or confirm an equivalent one exists
  Declare {
    /// Exchange name
    name: String,

    /// Exchange type: direct, fanout or topic
    #[arg(short = 't', long = "type", default_value = "direct", value_parser = ExchangeKind::from_str)]
    kind: ExchangeKind,

    /// Do not survive restarts
    #[arg(long)]
    transient: bool,

    /// Delete once its last binding is removed
    #[arg(long)]
    auto_delete: bool,

    /// Only check that the exchange exists
    #[arg(long)]
    passive: bool,
  },

  /// Delete an exchange and its bindings
  Delete {
    /// Exchange name
    name: String,

    /// Refuse while bindings reference the exchange
    #[arg(long)]
    if_unused: bool,
  },
}

pub fn cmd_exchange(broker: &Broker, command: ExchangeCommand, output: OutputFormat) -> Result<()> {
  match command {
    ExchangeCommand::Declare {
      name,
      kind,
      transient,
      auto_delete,
      passive,
    } => {
      let options = ExchangeOptions {
        durable: !transient,
        auto_delete,
        passive,
      };
      broker.declare_exchange(&name, kind, options)?;
      if output.is_json() {
        print_json(&json!({ "exchange": name, "type": kind, "durable": !transient, "auto_delete": auto_delete }))?;
      } else if passive {
        print_success(&format!("Exchange '{}' exists", name));
      } else {
        print_success(&format!("Exchange '{}' declared ({})", name, kind));
      }
    }
    ExchangeCommand::Delete { name, if_unused } => {
      broker.delete_exchange(&name, if_unused)?;
      if output.is_json() {
        print_json(&json!({ "exchange": name, "deleted": true }))?;
      } else {
        print_success(&format!("Exchange '{}' deleted", name));
      }
    }
  }
  Ok(())
}
