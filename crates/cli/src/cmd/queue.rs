use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use warren_lib::{Broker, QueueOptions};

use crate::output::{OutputFormat, print_json, print_stat, print_success};

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
  /// Declare a queue, or confirm an equivalent one exists
  Declare {
    /// Queue name; omit to have the broker generate one
    #[arg(default_value = "")]
    name: String,

    /// Do not survive restarts
    #[arg(long)]
    transient: bool,

    /// Delete once its last consumer leaves
    #[arg(long)]
    auto_delete: bool,

    /// Only check that the queue exists
    #[arg(long)]
    passive: bool,
  },

  /// Delete a queue and its bindings
  Delete {
    /// Queue name
    name: String,

    /// Refuse while the queue has consumers
    #[arg(long)]
    if_unused: bool,

    /// Refuse while the queue holds messages
    #[arg(long)]
    if_empty: bool,
  },
}

pub fn cmd_queue(broker: &Broker, command: QueueCommand, output: OutputFormat) -> Result<()> {
  match command {
    QueueCommand::Declare {
      name,
      transient,
      auto_delete,
      passive,
    } => {
      let options = QueueOptions {
        durable: !transient,
        exclusive: false,
        auto_delete,
        passive,
      };
      let ok = broker.declare_queue(&name, options)?;
      if output.is_json() {
        print_json(&ok)?;
      } else {
        print_success(&format!("Queue '{}' declared", ok.queue));
        print_stat("Messages", &ok.message_count.to_string());
        print_stat("Consumers", &ok.consumer_count.to_string());
      }
    }
    QueueCommand::Delete {
      name,
      if_unused,
      if_empty,
    } => {
      let dropped = broker.delete_queue(&name, if_unused, if_empty)?;
      if output.is_json() {
        print_json(&json!({ "queue": name, "message_count": dropped }))?;
      } else {
        print_success(&format!("Queue '{}' deleted", name));
        print_stat("Messages dropped", &dropped.to_string());
      }
    }
  }
  Ok(())
}
