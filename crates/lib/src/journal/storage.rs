//! Journal storage backends.
//!
//! # Storage Layout
//!
//! ```text
//! {data_dir}/
//! ├── journal.lock      # JournalLock: pid and version of the broker holding the journal
//! └── journal.jsonl     # header line, then one JournalEntry per line
//! ```
//!
//! # Example Journal File
//!
//! ```text
//! {"version":1}
//! {"seq":1,"ops":[{"op":"declare_exchange","name":"logs","kind":"topic","auto_delete":false}]}
//! {"seq":2,"ops":[{"op":"declare_queue","name":"audit","auto_delete":false}]}
//! {"seq":3,"ops":[{"op":"bind","queue":"audit","exchange":"logs","routing_key":"#"}]}
//! ```

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::util::sync::lock;

use super::lock::JournalLock;
use super::types::{JOURNAL_VERSION, JournalEntry, JournalError, JournalHeader};

/// Journal file name within the data directory.
const JOURNAL_FILENAME: &str = "journal.jsonl";

/// Where journal entries are kept. The broker only needs append and in-order replay.
pub trait JournalBackend: Send + fmt::Debug {
  /// Every entry recorded so far, in append order.
  fn load(&mut self) -> Result<Vec<JournalEntry>, JournalError>;

  fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError>;

  /// Atomically replace the whole log with `entries`.
  fn rewrite(&mut self, entries: &[JournalEntry]) -> Result<(), JournalError>;

  /// Flush everything appended so far to stable storage.
  fn sync(&mut self) -> Result<(), JournalError>;
}

/// When appended entries reach stable storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
  /// fsync after every entry.
  #[default]
  Always,
  /// Leave flushing to the OS until [`JournalBackend::sync`] or shutdown.
  Never,
}

impl std::str::FromStr for SyncPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "always" => Ok(SyncPolicy::Always),
      "never" => Ok(SyncPolicy::Never),
      other => Err(format!("unknown sync policy '{}' (expected 'always' or 'never')", other)),
    }
  }
}

/// JSON-lines journal in a locked data directory.
#[derive(Debug)]
pub struct FileJournal {
  dir: PathBuf,
  sync: SyncPolicy,
  /// Append handle, opened lazily and reopened after every rewrite.
  file: Option<File>,
  _lock: JournalLock,
}

impl FileJournal {
  /// Open the journal in `dir`, taking the directory lock.
  pub fn open(dir: impl Into<PathBuf>, sync: SyncPolicy) -> Result<Self, JournalError> {
    let dir = dir.into();
    fs::create_dir_all(&dir).map_err(JournalError::CreateDir)?;
    let lock = JournalLock::acquire(&dir, &dir.join(JOURNAL_FILENAME))?;
    Ok(Self {
      dir,
      sync,
      file: None,
      _lock: lock,
    })
  }

  pub fn path(&self) -> PathBuf {
    self.dir.join(JOURNAL_FILENAME)
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn append_handle(&mut self) -> Result<&mut File, JournalError> {
    let file = match self.file.take() {
      Some(file) => file,
      None => {
        let path = self.path();
        let fresh = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let mut file = OpenOptions::new()
          .create(true)
          .append(true)
          .open(&path)
          .map_err(JournalError::Write)?;
        if fresh {
          write_line(&mut file, &JournalHeader { version: JOURNAL_VERSION })?;
        }
        file
      }
    };
    Ok(self.file.insert(file))
  }
}

impl JournalBackend for FileJournal {
  fn load(&mut self) -> Result<Vec<JournalEntry>, JournalError> {
    let path = self.path();
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(JournalError::Read(e)),
    };
    parse_journal(&content)
  }

  fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
    let sync = self.sync;
    let file = self.append_handle()?;
    write_line(file, entry)?;
    if sync == SyncPolicy::Always {
      file.sync_data().map_err(JournalError::Write)?;
    }
    Ok(())
  }

  fn rewrite(&mut self, entries: &[JournalEntry]) -> Result<(), JournalError> {
    let path = self.path();
    let temp_path = self.dir.join(format!("{}.tmp", JOURNAL_FILENAME));

    // Write to temp, then rename, so a crash leaves either the old or the new journal.
    let mut temp = File::create(&temp_path).map_err(JournalError::Write)?;
    write_line(&mut temp, &JournalHeader { version: JOURNAL_VERSION })?;
    for entry in entries {
      write_line(&mut temp, entry)?;
    }
    temp.sync_all().map_err(JournalError::Write)?;
    drop(temp);

    self.file = None;
    fs::rename(&temp_path, &path).map_err(JournalError::Write)?;
    debug!(path = %path.display(), entries = entries.len(), "journal rewritten");
    Ok(())
  }

  fn sync(&mut self) -> Result<(), JournalError> {
    if let Some(file) = self.file.as_mut() {
      file.sync_all().map_err(JournalError::Write)?;
    }
    Ok(())
  }
}

fn write_line<T: Serialize>(file: &mut File, value: &T) -> Result<(), JournalError> {
  let mut line = serde_json::to_string(value).map_err(JournalError::Serialize)?;
  line.push('\n');
  file.write_all(line.as_bytes()).map_err(JournalError::Write)
}

/// Parse journal text into entries.
///
/// An unparsable final line is a write torn by a crash and is dropped; an unparsable line
/// anywhere else is corruption.
pub(crate) fn parse_journal(content: &str) -> Result<Vec<JournalEntry>, JournalError> {
  let lines: Vec<(usize, &str)> = content
    .lines()
    .enumerate()
    .map(|(idx, line)| (idx + 1, line.trim()))
    .filter(|(_, line)| !line.is_empty())
    .collect();

  let Some(((_, header_line), rest)) = lines.split_first() else {
    return Ok(Vec::new());
  };

  let header: JournalHeader = match serde_json::from_str(header_line) {
    Ok(header) => header,
    Err(e) if rest.is_empty() => {
      warn!(error = %e, "dropping torn journal header");
      return Ok(Vec::new());
    }
    Err(e) => {
      return Err(JournalError::Corrupt {
        line: 1,
        reason: e.to_string(),
      });
    }
  };
  if header.version != JOURNAL_VERSION {
    return Err(JournalError::UnsupportedVersion(header.version));
  }

  let mut entries = Vec::with_capacity(rest.len());
  for (pos, (line_no, line)) in rest.iter().enumerate() {
    match serde_json::from_str::<JournalEntry>(line) {
      Ok(entry) => entries.push(entry),
      Err(e) if pos + 1 == rest.len() => {
        warn!(line = line_no, error = %e, "dropping torn journal tail");
      }
      Err(e) => {
        return Err(JournalError::Corrupt {
          line: *line_no,
          reason: e.to_string(),
        });
      }
    }
  }
  Ok(entries)
}

/// In-process journal.
///
/// Clones share one log, so a broker reopened with a clone of the same `MemoryJournal`
/// replays what the previous broker recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
  entries: Arc<Mutex<Vec<JournalEntry>>>,
  fail_writes: Arc<AtomicBool>,
}

impl MemoryJournal {
  pub fn new() -> Self {
    Self::default()
  }

  /// Entries currently in the log.
  pub fn entries(&self) -> Vec<JournalEntry> {
    lock(&self.entries).clone()
  }

  /// Make every following append and rewrite fail, simulating an unavailable medium.
  pub fn fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  fn check_writable(&self) -> Result<(), JournalError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(JournalError::Write(io::Error::other("journal writes disabled")));
    }
    Ok(())
  }
}

impl JournalBackend for MemoryJournal {
  fn load(&mut self) -> Result<Vec<JournalEntry>, JournalError> {
    Ok(self.entries())
  }

  fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
    self.check_writable()?;
    lock(&self.entries).push(entry.clone());
    Ok(())
  }

  fn rewrite(&mut self, entries: &[JournalEntry]) -> Result<(), JournalError> {
    self.check_writable()?;
    *lock(&self.entries) = entries.to_vec();
    Ok(())
  }

  fn sync(&mut self) -> Result<(), JournalError> {
    Ok(())
  }
}
