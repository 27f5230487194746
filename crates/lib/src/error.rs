//! Error types reported by lifecycle operations.
//!
//! Every failure is terminal for the operation that raised it. The transport layer maps
//! [`BrokerError::reply_code`] onto its own channel-level exception codes.

use thiserror::Error;

use crate::binding::Binding;
use crate::entity::EntityKey;
use crate::journal::JournalError;

/// Coarse classification of a [`BrokerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Conflict,
  NotFound,
  PreconditionFailed,
  AccessRefused,
  ResourceLocked,
  Closed,
  Internal,
}

/// Errors returned by [`crate::broker::Broker`] operations.
#[derive(Debug, Error)]
pub enum BrokerError {
  /// Redeclaration with parameters that differ from the existing entity.
  #[error("inequivalent arguments for {entity}: {reason}")]
  Conflict { entity: EntityKey, reason: String },

  /// The operation names a queue, exchange or binding that does not exist.
  ///
  /// Unbind reports a missing queue, a missing exchange and a missing tuple through this
  /// one variant; only the message tells them apart.
  #[error("not found: {0}")]
  NotFound(String),

  /// An `if_unused` / `if_empty` condition did not hold, or the request is malformed.
  #[error("precondition failed: {0}")]
  PreconditionFailed(String),

  /// The operation touches a reserved or built-in entity.
  #[error("access refused: {0}")]
  AccessRefused(String),

  /// The queue is exclusive to another connection.
  #[error("resource locked: cannot obtain exclusive access to locked {0}")]
  ResourceLocked(EntityKey),

  /// The broker has been shut down.
  #[error("broker is shut down")]
  Closed,

  /// The durability journal could not record the operation. Nothing was changed.
  #[error("journal error: {0}")]
  Journal(#[from] JournalError),
}

impl BrokerError {
  pub(crate) fn no_exchange(name: &str) -> Self {
    BrokerError::NotFound(format!("{}", EntityKey::exchange(name)))
  }

  pub(crate) fn no_queue(name: &str) -> Self {
    BrokerError::NotFound(format!("{}", EntityKey::queue(name)))
  }

  pub(crate) fn no_binding(binding: &Binding) -> Self {
    BrokerError::NotFound(format!("no binding {}", binding))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      BrokerError::Conflict { .. } => ErrorKind::Conflict,
      BrokerError::NotFound(_) => ErrorKind::NotFound,
      BrokerError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
      BrokerError::AccessRefused(_) => ErrorKind::AccessRefused,
      BrokerError::ResourceLocked(_) => ErrorKind::ResourceLocked,
      BrokerError::Closed => ErrorKind::Closed,
      BrokerError::Journal(_) => ErrorKind::Internal,
    }
  }

  /// AMQP 0-9-1 reply code for this error.
  ///
  /// Declaration conflicts share 406 with precondition failures, as the protocol has no
  /// dedicated code for them.
  pub fn reply_code(&self) -> u16 {
    match self.kind() {
      ErrorKind::AccessRefused => 403,
      ErrorKind::NotFound => 404,
      ErrorKind::ResourceLocked => 405,
      ErrorKind::Conflict | ErrorKind::PreconditionFailed => 406,
      ErrorKind::Closed => 320,
      ErrorKind::Internal => 541,
    }
  }
}
