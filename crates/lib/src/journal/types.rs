use std::collections::{BTreeMap, BTreeSet};
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::Binding;
use crate::consts::is_builtin_exchange;
use crate::entity::{ExchangeDef, ExchangeKind, QueueDef};

use super::lock::JournalLockError;

/// Current on-disk journal format version.
pub const JOURNAL_VERSION: u32 = 1;

/// First line of a journal file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalHeader {
  pub version: u32,
}

/// One durable mutation.
///
/// Only durable, non-exclusive entities and bindings between two such entities are ever
/// recorded. Built-in exchanges are never declared in the journal; bindings to them are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalOp {
  DeclareExchange {
    name: String,
    kind: ExchangeKind,
    auto_delete: bool,
  },
  DeleteExchange {
    name: String,
  },
  DeclareQueue {
    name: String,
    auto_delete: bool,
  },
  DeleteQueue {
    name: String,
  },
  Bind(Binding),
  Unbind(Binding),
}

/// The ops of one broker operation. Replay applies an entry entirely or, if it was torn
/// by a crash, not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
  pub seq: u64,
  pub ops: Vec<JournalOp>,
}

/// Durable entities and bindings reconstructed from the journal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DurableState {
  pub exchanges: BTreeMap<String, ExchangeDef>,
  pub queues: BTreeMap<String, QueueDef>,
  pub bindings: BTreeSet<Binding>,
}

impl DurableState {
  /// Fold one op into the state. Returns `false` when the op was skipped because it names
  /// an entity the state does not hold.
  pub fn apply(&mut self, op: &JournalOp) -> bool {
    match op {
      JournalOp::DeclareExchange { name, kind, auto_delete } => {
        self.exchanges.insert(
          name.clone(),
          ExchangeDef {
            name: name.clone(),
            kind: *kind,
            durable: true,
            auto_delete: *auto_delete,
          },
        );
        true
      }
      JournalOp::DeleteExchange { name } => {
        self.bindings.retain(|b| &b.exchange != name);
        self.exchanges.remove(name).is_some()
      }
      JournalOp::DeclareQueue { name, auto_delete } => {
        self.queues.insert(
          name.clone(),
          QueueDef {
            name: name.clone(),
            durable: true,
            exclusive: false,
            auto_delete: *auto_delete,
          },
        );
        true
      }
      JournalOp::DeleteQueue { name } => {
        self.bindings.retain(|b| &b.queue != name);
        self.queues.remove(name).is_some()
      }
      JournalOp::Bind(binding) => {
        let exchange_known =
          self.exchanges.contains_key(&binding.exchange) || is_builtin_exchange(&binding.exchange);
        if !exchange_known || !self.queues.contains_key(&binding.queue) {
          return false;
        }
        self.bindings.insert(binding.clone());
        true
      }
      JournalOp::Unbind(binding) => self.bindings.remove(binding),
    }
  }

  /// The shortest op list that reproduces this state: declarations first, then bindings.
  pub fn to_ops(&self) -> Vec<JournalOp> {
    let exchanges = self.exchanges.values().map(|def| JournalOp::DeclareExchange {
      name: def.name.clone(),
      kind: def.kind,
      auto_delete: def.auto_delete,
    });
    let queues = self.queues.values().map(|def| JournalOp::DeclareQueue {
      name: def.name.clone(),
      auto_delete: def.auto_delete,
    });
    let bindings = self.bindings.iter().cloned().map(JournalOp::Bind);
    exchanges.chain(queues).chain(bindings).collect()
  }

  pub fn is_empty(&self) -> bool {
    self.exchanges.is_empty() && self.queues.is_empty() && self.bindings.is_empty()
  }
}

/// Errors raised by the durability journal.
#[derive(Debug, Error)]
pub enum JournalError {
  #[error("failed to create journal directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read journal: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write journal: {0}")]
  Write(#[source] io::Error),

  #[error("failed to serialize journal entry: {0}")]
  Serialize(#[source] serde_json::Error),

  /// A record before the end of the journal could not be parsed.
  #[error("corrupt journal at line {line}: {reason}")]
  Corrupt { line: usize, reason: String },

  #[error("unsupported journal version: {0}")]
  UnsupportedVersion(u32),

  #[error(transparent)]
  Lock(#[from] JournalLockError),
}
