mod bind;
mod compact;
mod exchange;
mod queue;
mod route;
mod status;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use warren_lib::{Broker, BrokerConfig, JournalConfig};

pub use bind::{cmd_bind, cmd_unbind};
pub use compact::cmd_compact;
pub use exchange::{ExchangeCommand, cmd_exchange};
pub use queue::{QueueCommand, cmd_queue};
pub use route::cmd_route;
pub use status::cmd_status;

/// Open the broker on `data_dir`, or on the directory named by the environment.
///
/// Opening replays the journal; only durable state carries over between invocations.
pub fn open_broker(data_dir: Option<&Path>) -> Result<Broker> {
  let mut config = BrokerConfig::from_env().context("Invalid broker configuration")?;
  if let Some(dir) = data_dir {
    config = config.with_data_dir(dir);
  }
  if let JournalConfig::File { dir, .. } = &config.journal {
    debug!(dir = %dir.display(), "opening broker");
  }
  Broker::open(config).context("Failed to open broker")
}
