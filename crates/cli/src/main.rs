mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use warren_lib::BrokerError;

use cmd::{ExchangeCommand, QueueCommand};
use output::{OutputFormat, print_error};

/// warren - inspect and manage a broker's durable topology
#[derive(Parser)]
#[command(name = "warren")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Data directory holding the journal (default: $WARREN_DATA_DIR or the platform data dir)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text", global = true)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show exchanges, queues and bindings
  Status,

  /// Declare or delete exchanges
  #[command(subcommand)]
  Exchange(ExchangeCommand),

  /// Declare or delete queues
  #[command(subcommand)]
  Queue(QueueCommand),

  /// Bind a queue to an exchange
  Bind {
    queue: String,
    exchange: String,
    #[arg(default_value = "")]
    routing_key: String,
  },

  /// Remove a binding
  Unbind {
    queue: String,
    exchange: String,
    #[arg(default_value = "")]
    routing_key: String,
  },

  /// Show which queues a message would reach
  Route { exchange: String, routing_key: String },

  /// Rewrite the journal to its minimal form
  Compact,
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "warren=debug,warren_lib=debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let broker = cmd::open_broker(cli.data_dir.as_deref())?;
  let output = cli.output;

  let result = match cli.command {
    Commands::Status => cmd::cmd_status(&broker, cli.verbose, output),
    Commands::Exchange(command) => cmd::cmd_exchange(&broker, command, output),
    Commands::Queue(command) => cmd::cmd_queue(&broker, command, output),
    Commands::Bind {
      queue,
      exchange,
      routing_key,
    } => cmd::cmd_bind(&broker, &queue, &exchange, &routing_key, output),
    Commands::Unbind {
      queue,
      exchange,
      routing_key,
    } => cmd::cmd_unbind(&broker, &queue, &exchange, &routing_key, output),
    Commands::Route { exchange, routing_key } => cmd::cmd_route(&broker, &exchange, &routing_key, output),
    Commands::Compact => cmd::cmd_compact(&broker, output),
  };

  let shutdown = broker.shutdown();
  result?;
  shutdown.context("Failed to shut down broker")?;
  Ok(())
}

fn report(err: &anyhow::Error) {
  let reply_code = err
    .chain()
    .find_map(|cause| cause.downcast_ref::<BrokerError>())
    .map(BrokerError::reply_code);
  match reply_code {
    Some(code) => print_error(&format!("{:#} (reply code {})", err, code)),
    None => print_error(&format!("{:#}", err)),
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      report(&e);
      ExitCode::FAILURE
    }
  }
}
