//! warren-lib: binding lifecycle core for a message broker
//!
//! This crate tracks exchanges, queues and the bindings between them, and keeps them
//! consistent across durability, auto-delete and transience:
//! - `Broker`: the lifecycle coordinator, entry point for every operation
//! - `BindingTable`: unique `(queue, exchange, routing key)` tuples, indexed both ways
//! - `EntityRegistry`: live exchanges and queues
//! - `ReferenceTracker`: consumer and binding counts that drive auto-delete
//! - `Journal`: append-only log of durable changes, replayed on open

pub mod binding;
pub mod broker;
pub mod config;
pub mod consts;
pub mod entity;
pub mod error;
pub mod journal;
pub mod messages;
pub mod platform;
pub mod refs;
pub mod routing;
pub mod util;

pub use binding::{Binding, BindingTable};
pub use broker::{Broker, BrokerBuilder, Channel, Connection, ConsumerTag, ExchangeOptions, QueueDeclareOk, QueueOptions};
pub use config::{BrokerConfig, JournalConfig};
pub use entity::{ConnectionId, EntityKey, EntityRegistry, Exchange, ExchangeKind, Queue};
pub use error::{BrokerError, ErrorKind};
pub use messages::{MemoryStore, Message, MessageStore};
pub use routing::{KeyMatcher, Matcher};
