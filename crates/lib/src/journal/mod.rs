//! Durability journal.
//!
//! Durable declarations, deletions, binds and unbinds are appended as [`JournalEntry`]s.
//! On open, the log is replayed into a [`DurableState`] and immediately compacted, so the
//! stored log never holds more than the live durable state plus the entries appended since.
//!
//! # Submodules
//!
//! - [`lock`] - advisory lock keeping one broker per journal
//! - [`storage`] - file and in-memory backends
//! - `types` - records, replay state and errors

pub mod lock;
pub mod storage;
mod types;

use tracing::{info, warn};

pub use lock::{JournalLock, JournalLockError, LockHolder};
pub use storage::{FileJournal, JournalBackend, MemoryJournal, SyncPolicy};
pub use types::*;

/// A journal backend plus the durable state it currently encodes.
#[derive(Debug)]
pub struct Journal {
  backend: Box<dyn JournalBackend>,
  state: DurableState,
  last_seq: u64,
  appended_since_compact: usize,
  compact_after: usize,
}

impl Journal {
  /// Replay `backend` and compact it.
  pub fn open(mut backend: Box<dyn JournalBackend>, compact_after: usize) -> Result<Self, JournalError> {
    let entries = backend.load()?;
    let mut state = DurableState::default();
    let mut last_seq = 0;
    let mut skipped = 0;

    for entry in &entries {
      if entry.seq <= last_seq && last_seq != 0 {
        warn!(seq = entry.seq, previous = last_seq, "journal entry out of sequence");
      }
      last_seq = last_seq.max(entry.seq);
      for op in &entry.ops {
        if !state.apply(op) {
          warn!(seq = entry.seq, op = ?op, "skipping journal op for unknown entity");
          skipped += 1;
        }
      }
    }

    info!(
      entries = entries.len(),
      exchanges = state.exchanges.len(),
      queues = state.queues.len(),
      bindings = state.bindings.len(),
      skipped,
      "journal replayed"
    );

    let mut journal = Self {
      backend,
      state,
      last_seq,
      appended_since_compact: 0,
      compact_after: compact_after.max(1),
    };
    journal.compact()?;
    Ok(journal)
  }

  pub fn state(&self) -> &DurableState {
    &self.state
  }

  /// Append `ops` as one entry. Nothing is recorded when `ops` is empty.
  ///
  /// On error neither the backend nor the replay state has changed.
  pub fn record(&mut self, ops: Vec<JournalOp>) -> Result<(), JournalError> {
    if ops.is_empty() {
      return Ok(());
    }

    let entry = JournalEntry {
      seq: self.last_seq + 1,
      ops,
    };
    self.backend.append(&entry)?;

    self.last_seq = entry.seq;
    for op in &entry.ops {
      self.state.apply(op);
    }
    self.appended_since_compact += 1;

    if self.appended_since_compact >= self.compact_after
      && let Err(e) = self.compact()
    {
      // The entry is already durable; a later compaction will retry.
      warn!(error = %e, "journal compaction failed");
    }
    Ok(())
  }

  /// Rewrite the backend to a single entry reproducing the current durable state.
  pub fn compact(&mut self) -> Result<(), JournalError> {
    let ops = self.state.to_ops();
    let entries = if ops.is_empty() {
      Vec::new()
    } else {
      vec![JournalEntry {
        seq: self.last_seq.max(1),
        ops,
      }]
    };
    self.backend.rewrite(&entries)?;
    self.last_seq = self.last_seq.max(1);
    self.appended_since_compact = 0;
    info!(ops = entries.first().map_or(0, |e| e.ops.len()), "journal compacted");
    Ok(())
  }

  pub fn sync(&mut self) -> Result<(), JournalError> {
    self.backend.sync()
  }
}
