//! Broker configuration.
//!
//! Configuration comes from code ([`BrokerConfig::in_memory`], [`BrokerConfig::file`]) or
//! from the environment ([`BrokerConfig::from_env`]):
//!
//! | variable | meaning | default |
//! |----------|---------|---------|
//! | `WARREN_DATA_DIR` | journal directory | `$XDG_DATA_HOME/warren` |
//! | `WARREN_JOURNAL_SYNC` | `always` or `never` | `always` |
//! | `WARREN_COMPACT_AFTER` | entries between compactions | `4096` |

use std::path::PathBuf;

use thiserror::Error;

use crate::consts::DEFAULT_COMPACT_AFTER;
use crate::journal::{FileJournal, JournalBackend, JournalError, MemoryJournal, SyncPolicy};
use crate::platform::paths::data_dir;

const SYNC_ENV: &str = "WARREN_JOURNAL_SYNC";
const COMPACT_AFTER_ENV: &str = "WARREN_COMPACT_AFTER";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid value '{value}' for {var}: {reason}")]
  InvalidValue {
    var: &'static str,
    value: String,
    reason: String,
  },
}

/// Where durable state is journaled.
#[derive(Debug, Clone)]
pub enum JournalConfig {
  /// In-process log. Survives [`crate::broker::Broker::restart`] but not the process.
  Memory(MemoryJournal),
  /// JSON-lines journal in a locked directory.
  File { dir: PathBuf, sync: SyncPolicy },
}

impl JournalConfig {
  pub(crate) fn open(&self) -> Result<Box<dyn JournalBackend>, JournalError> {
    match self {
      JournalConfig::Memory(journal) => Ok(Box::new(journal.clone())),
      JournalConfig::File { dir, sync } => Ok(Box::new(FileJournal::open(dir.clone(), *sync)?)),
    }
  }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
  pub journal: JournalConfig,
  /// Appended entries that trigger a compaction.
  pub compact_after: usize,
}

impl BrokerConfig {
  /// A broker backed by a fresh in-memory journal.
  pub fn in_memory() -> Self {
    Self::with_memory_journal(MemoryJournal::new())
  }

  /// A broker backed by `journal`. Reopening with a clone of the same journal replays it.
  pub fn with_memory_journal(journal: MemoryJournal) -> Self {
    Self {
      journal: JournalConfig::Memory(journal),
      compact_after: DEFAULT_COMPACT_AFTER,
    }
  }

  /// A broker journaling to `dir`, syncing every entry.
  pub fn file(dir: impl Into<PathBuf>) -> Self {
    Self {
      journal: JournalConfig::File {
        dir: dir.into(),
        sync: SyncPolicy::Always,
      },
      compact_after: DEFAULT_COMPACT_AFTER,
    }
  }

  /// File-backed configuration from the environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    let sync = match std::env::var(SYNC_ENV) {
      Ok(value) => value.parse::<SyncPolicy>().map_err(|reason| ConfigError::InvalidValue {
        var: SYNC_ENV,
        value: value.clone(),
        reason,
      })?,
      Err(_) => SyncPolicy::default(),
    };

    let compact_after = match std::env::var(COMPACT_AFTER_ENV) {
      Ok(value) => match value.parse::<usize>() {
        Ok(n) if n > 0 => n,
        Ok(_) => {
          return Err(ConfigError::InvalidValue {
            var: COMPACT_AFTER_ENV,
            value,
            reason: "must be greater than zero".to_string(),
          });
        }
        Err(e) => {
          return Err(ConfigError::InvalidValue {
            var: COMPACT_AFTER_ENV,
            value,
            reason: e.to_string(),
          });
        }
      },
      Err(_) => DEFAULT_COMPACT_AFTER,
    };

    Ok(Self {
      journal: JournalConfig::File { dir: data_dir(), sync },
      compact_after,
    })
  }

  /// Replace the journal directory, keeping the sync policy of a file journal.
  pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    let sync = match self.journal {
      JournalConfig::File { sync, .. } => sync,
      JournalConfig::Memory(_) => SyncPolicy::default(),
    };
    self.journal = JournalConfig::File { dir: dir.into(), sync };
    self
  }
}
