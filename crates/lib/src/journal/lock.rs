//! Advisory lock on a journal.
//!
//! Only one broker may replay and append to a journal at a time. The lock file sits next to
//! the journal and records which broker holds it, so a refused open can say who to stop.
//! The lock is held for the lifetime of the [`JournalLock`] and released when it is dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lock file name within the data directory.
pub const LOCK_FILENAME: &str = "journal.lock";

const LOCK_FORMAT: u32 = 1;

/// Who holds a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  pub format: u32,
  pub pid: u32,
  /// Version of the broker that took the lock.
  pub broker_version: String,
  pub journal: PathBuf,
  pub acquired_at_unix: u64,
}

impl LockHolder {
  fn current(journal: &Path) -> Self {
    Self {
      format: LOCK_FORMAT,
      pid: std::process::id(),
      broker_version: env!("CARGO_PKG_VERSION").to_string(),
      journal: journal.to_path_buf(),
      acquired_at_unix: unix_now(),
    }
  }

  /// Seconds since the holder took the lock.
  pub fn held_for(&self) -> u64 {
    unix_now().saturating_sub(self.acquired_at_unix)
  }
}

#[derive(Debug, Error)]
pub enum JournalLockError {
  #[error("journal {journal} is already open in this process")]
  AlreadyOpen { journal: PathBuf },

  #[error(
    "journal {journal} is in use by another broker (warren {broker_version}, pid {pid}, held for {held_for}s)\n\
     If that broker is gone, remove the lock file:\n  {lock_path}"
  )]
  Held {
    journal: PathBuf,
    pid: u32,
    broker_version: String,
    held_for: u64,
    lock_path: PathBuf,
  },

  #[error(
    "journal is in use by another broker (lock file unreadable)\n\
     If that broker is gone, remove the lock file:\n  {lock_path}"
  )]
  HeldUnknown { lock_path: PathBuf },

  #[error("failed to open journal lock: {0}")]
  Open(#[source] io::Error),

  #[error("failed to record journal lock holder: {0}")]
  WriteHolder(#[source] io::Error),

  #[error("failed to lock journal: {0}")]
  Lock(#[source] io::Error),
}

#[derive(Debug)]
pub struct JournalLock {
  file: File,
  lock_path: PathBuf,
}

impl JournalLock {
  /// Lock `journal` through a lock file in `dir`, which must already exist.
  pub fn acquire(dir: &Path, journal: &Path) -> Result<Self, JournalLockError> {
    let lock_path = dir.join(LOCK_FILENAME);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(JournalLockError::Open)?;

    if let Err(err) = try_lock(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(refused(&lock_path, journal));
      }
      return Err(JournalLockError::Lock(err));
    }

    write_holder(&file, &LockHolder::current(journal))?;
    Ok(JournalLock { file, lock_path })
  }

  /// The holder record, read through the held handle.
  ///
  /// Opening a second handle would fail on Windows, where locks are mandatory.
  pub fn holder(&self) -> io::Result<LockHolder> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_holder(file: &File, holder: &LockHolder) -> Result<(), JournalLockError> {
  file.set_len(0).map_err(JournalLockError::WriteHolder)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer(&mut writer, holder).map_err(|e| JournalLockError::WriteHolder(io::Error::other(e)))?;
  writer.flush().map_err(JournalLockError::WriteHolder)
}

fn refused(lock_path: &Path, journal: &Path) -> JournalLockError {
  let holder = std::fs::read_to_string(lock_path)
    .ok()
    .and_then(|contents| serde_json::from_str::<LockHolder>(&contents).ok());

  match holder {
    Some(holder) if holder.pid == std::process::id() => JournalLockError::AlreadyOpen {
      journal: journal.to_path_buf(),
    },
    Some(holder) => JournalLockError::Held {
      journal: holder.journal.clone(),
      pid: holder.pid,
      held_for: holder.held_for(),
      broker_version: holder.broker_version,
      lock_path: lock_path.to_path_buf(),
    },
    None => JournalLockError::HeldUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: a zeroed OVERLAPPED is valid, and the handle stays open for the call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result != 0 {
    return Ok(());
  }
  let err = io::Error::last_os_error();
  if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
    return Err(io::Error::from(io::ErrorKind::WouldBlock));
  }
  Err(err)
}
