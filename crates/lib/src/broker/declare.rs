use serde::Serialize;
use tracing::{debug, info};

use crate::consts::{DEFAULT_EXCHANGE, MAX_NAME_LEN, RESERVED_PREFIX};
use crate::entity::{ConnectionId, EntityKey, Exchange, ExchangeDef, ExchangeKind, Queue, QueueDef};
use crate::error::BrokerError;
use crate::journal::JournalOp;
use crate::util::sync::{read, write};

use super::Broker;

/// Flags of an exchange declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeOptions {
  pub durable: bool,
  pub auto_delete: bool,
  /// Only check that the exchange exists.
  pub passive: bool,
}

impl ExchangeOptions {
  pub fn durable() -> Self {
    Self {
      durable: true,
      ..Self::default()
    }
  }

  pub fn passive() -> Self {
    Self {
      passive: true,
      ..Self::default()
    }
  }
}

/// Flags of a queue declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
  pub durable: bool,
  pub exclusive: bool,
  pub auto_delete: bool,
  /// Only check that the queue exists.
  pub passive: bool,
}

impl QueueOptions {
  pub fn durable() -> Self {
    Self {
      durable: true,
      ..Self::default()
    }
  }

  pub fn passive() -> Self {
    Self {
      passive: true,
      ..Self::default()
    }
  }
}

/// Result of a successful queue declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDeclareOk {
  /// The queue name; server-generated when the request named none.
  pub queue: String,
  pub message_count: u32,
  pub consumer_count: u32,
}

fn validate_name(name: &str) -> Result<(), BrokerError> {
  if name.len() > MAX_NAME_LEN {
    return Err(BrokerError::PreconditionFailed(format!(
      "name is {} bytes long, the limit is {}",
      name.len(),
      MAX_NAME_LEN
    )));
  }
  Ok(())
}

fn reserved(name: &str) -> bool {
  name.starts_with(RESERVED_PREFIX)
}

fn exchange_mismatch(existing: &ExchangeDef, requested: &ExchangeDef) -> Option<String> {
  if existing.kind != requested.kind {
    return Some(format!("type is '{}', requested '{}'", existing.kind, requested.kind));
  }
  if existing.durable != requested.durable {
    return Some(format!("durable is {}, requested {}", existing.durable, requested.durable));
  }
  if existing.auto_delete != requested.auto_delete {
    return Some(format!(
      "auto_delete is {}, requested {}",
      existing.auto_delete, requested.auto_delete
    ));
  }
  None
}

fn queue_mismatch(existing: &QueueDef, requested: &QueueDef) -> Option<String> {
  if existing.durable != requested.durable {
    return Some(format!("durable is {}, requested {}", existing.durable, requested.durable));
  }
  if existing.exclusive != requested.exclusive {
    return Some(format!(
      "exclusive is {}, requested {}",
      existing.exclusive, requested.exclusive
    ));
  }
  if existing.auto_delete != requested.auto_delete {
    return Some(format!(
      "auto_delete is {}, requested {}",
      existing.auto_delete, requested.auto_delete
    ));
  }
  None
}

impl Broker {
  /// Declare an exchange.
  ///
  /// Redeclaring with identical parameters succeeds without change. A passive declaration
  /// only checks existence.
  ///
  /// # Errors
  ///
  /// * [`BrokerError::Conflict`] - the exchange exists with different parameters
  /// * [`BrokerError::NotFound`] - passive declaration of a missing exchange
  /// * [`BrokerError::AccessRefused`] - the name is the default exchange or starts with `amq.`
  pub fn declare_exchange(&self, name: &str, kind: ExchangeKind, options: ExchangeOptions) -> Result<(), BrokerError> {
    self.ensure_open()?;
    validate_name(name)?;

    if name == DEFAULT_EXCHANGE {
      if options.passive {
        return Ok(());
      }
      return Err(BrokerError::AccessRefused(
        "operation not permitted on the default exchange".to_string(),
      ));
    }

    let _guard = self.inner.locks.acquire([EntityKey::exchange(name)]);

    let requested = ExchangeDef {
      name: name.to_string(),
      kind,
      durable: options.durable,
      auto_delete: options.auto_delete,
    };

    if let Some(existing) = read(&self.inner.topology).registry.exchange(name) {
      if options.passive {
        return Ok(());
      }
      if let Some(reason) = exchange_mismatch(&existing.def, &requested) {
        return Err(BrokerError::Conflict {
          entity: EntityKey::exchange(name),
          reason,
        });
      }
      debug!(exchange = %name, "exchange already declared");
      return Ok(());
    }

    if options.passive {
      return Err(BrokerError::no_exchange(name));
    }
    if reserved(name) {
      return Err(BrokerError::AccessRefused(format!(
        "exchange name '{}' contains reserved prefix '{}'",
        name, RESERVED_PREFIX
      )));
    }

    if requested.durable {
      self.record(vec![JournalOp::DeclareExchange {
        name: requested.name.clone(),
        kind,
        auto_delete: requested.auto_delete,
      }])?;
    }

    info!(
      exchange = %name,
      kind = %kind,
      durable = requested.durable,
      auto_delete = requested.auto_delete,
      "exchange declared"
    );
    write(&self.inner.topology)
      .registry
      .insert_exchange(Exchange::new(requested));
    Ok(())
  }

  /// Declare a queue from the administrative context.
  ///
  /// An empty name draws a fresh `amq.gen-` name. Exclusive queues declared here belong to
  /// no connection and live until deleted.
  pub fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<QueueDeclareOk, BrokerError> {
    self.declare_queue_as(ConnectionId::ADMIN, name, options)
  }

  pub(super) fn declare_queue_as(
    &self,
    conn: ConnectionId,
    name: &str,
    options: QueueOptions,
  ) -> Result<QueueDeclareOk, BrokerError> {
    self.ensure_open()?;

    let name = if name.is_empty() {
      if options.passive {
        return Err(BrokerError::no_queue(name));
      }
      // Safe before locking: the atomic counter never hands two callers the same name.
      read(&self.inner.topology).registry.generate_queue_name()
    } else {
      validate_name(name)?;
      if !options.passive && reserved(name) {
        return Err(BrokerError::AccessRefused(format!(
          "queue name '{}' contains reserved prefix '{}'",
          name, RESERVED_PREFIX
        )));
      }
      name.to_string()
    };

    let _guard = self.inner.locks.acquire([EntityKey::queue(&name)]);

    let requested = QueueDef {
      name: name.clone(),
      durable: options.durable,
      exclusive: options.exclusive,
      auto_delete: options.auto_delete,
    };

    let existing = read(&self.inner.topology).registry.queue(&name).cloned();
    match existing {
      Some(existing) => {
        if !existing.accessible_by(conn) {
          return Err(BrokerError::ResourceLocked(EntityKey::queue(&name)));
        }
        if !options.passive {
          if let Some(reason) = queue_mismatch(&existing.def, &requested) {
            return Err(BrokerError::Conflict {
              entity: EntityKey::queue(&name),
              reason,
            });
          }
          debug!(queue = %name, "queue already declared");
        }
      }
      None => {
        if options.passive {
          return Err(BrokerError::no_queue(&name));
        }
        if requested.persistent() {
          self.record(vec![JournalOp::DeclareQueue {
            name: name.clone(),
            auto_delete: requested.auto_delete,
          }])?;
        }

        info!(
          queue = %name,
          durable = requested.durable,
          exclusive = requested.exclusive,
          auto_delete = requested.auto_delete,
          owner = ?requested.exclusive.then_some(conn),
          "queue declared"
        );
        let owner = requested.exclusive.then_some(conn);
        write(&self.inner.topology)
          .registry
          .insert_queue(Queue::new(requested, owner));
      }
    }

    Ok(QueueDeclareOk {
      message_count: self.inner.store.message_count(&name),
      consumer_count: read(&self.inner.topology).refs.consumers(&name),
      queue: name,
    })
  }
}
