use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Routing behaviour of an exchange.
///
/// The core never dispatches on this itself; it is handed to the [`crate::routing::Matcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
  Direct,
  Fanout,
  Topic,
}

impl ExchangeKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExchangeKind::Direct => "direct",
      ExchangeKind::Fanout => "fanout",
      ExchangeKind::Topic => "topic",
    }
  }
}

impl fmt::Display for ExchangeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ExchangeKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "direct" => Ok(ExchangeKind::Direct),
      "fanout" => Ok(ExchangeKind::Fanout),
      "topic" => Ok(ExchangeKind::Topic),
      other => Err(format!("unknown exchange type '{}'", other)),
    }
  }
}

/// Lifecycle state of a record.
///
/// Records stored in the registry are always `Active`. A record handed back by a removal is
/// `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
  Active,
  Deleted,
}

/// Identity of the connection a request arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
  /// Administrative context: broker-level calls. Bypasses exclusive ownership checks.
  pub const ADMIN: ConnectionId = ConnectionId(0);
}

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "conn-{}", self.0)
  }
}

/// The parameters an exchange was declared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeDef {
  pub name: String,
  pub kind: ExchangeKind,
  pub durable: bool,
  pub auto_delete: bool,
}

/// The parameters a queue was declared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDef {
  pub name: String,
  pub durable: bool,
  pub exclusive: bool,
  pub auto_delete: bool,
}

impl QueueDef {
  /// Whether the queue is written to the journal.
  ///
  /// Exclusive queues die with their connection and are never persisted.
  pub fn persistent(&self) -> bool {
    self.durable && !self.exclusive
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
  pub def: ExchangeDef,
  /// Predeclared by the broker; cannot be deleted or bound to explicitly when default.
  pub builtin: bool,
  pub state: EntityState,
}

impl Exchange {
  pub fn new(def: ExchangeDef) -> Self {
    Self {
      def,
      builtin: false,
      state: EntityState::Active,
    }
  }

  pub(crate) fn builtin(name: &str, kind: ExchangeKind) -> Self {
    Self {
      def: ExchangeDef {
        name: name.to_string(),
        kind,
        durable: true,
        auto_delete: false,
      },
      builtin: true,
      state: EntityState::Active,
    }
  }

  pub fn name(&self) -> &str {
    &self.def.name
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Queue {
  pub def: QueueDef,
  /// Owning connection of an exclusive queue.
  pub owner: Option<ConnectionId>,
  pub state: EntityState,
  /// Distinguishes this record from earlier queues of the same name. Assigned by
  /// [`EntityRegistry::insert_queue`](super::EntityRegistry::insert_queue); zero until then.
  #[serde(skip)]
  pub incarnation: u64,
}

impl Queue {
  pub fn new(def: QueueDef, owner: Option<ConnectionId>) -> Self {
    Self {
      def,
      owner,
      state: EntityState::Active,
      incarnation: 0,
    }
  }

  pub fn name(&self) -> &str {
    &self.def.name
  }

  /// Whether `conn` may use this queue.
  pub fn accessible_by(&self, conn: ConnectionId) -> bool {
    conn == ConnectionId::ADMIN || self.owner.is_none_or(|owner| owner == conn)
  }
}

/// Names an exchange or a queue. Used as the unit of operation-level locking.
///
/// Exchanges order before queues; within a kind, names order lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
  Exchange(String),
  Queue(String),
}

impl EntityKey {
  pub fn exchange(name: impl Into<String>) -> Self {
    EntityKey::Exchange(name.into())
  }

  pub fn queue(name: impl Into<String>) -> Self {
    EntityKey::Queue(name.into())
  }
}

impl fmt::Display for EntityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EntityKey::Exchange(name) => write!(f, "exchange '{}'", name),
      EntityKey::Queue(name) => write!(f, "queue '{}'", name),
    }
  }
}
