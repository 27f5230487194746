use std::fmt;

use serde::{Deserialize, Serialize};

/// A `(queue, exchange, routing key)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
  pub queue: String,
  pub exchange: String,
  pub routing_key: String,
}

impl Binding {
  pub fn new(queue: impl Into<String>, exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
    Self {
      queue: queue.into(),
      exchange: exchange.into(),
      routing_key: routing_key.into(),
    }
  }
}

impl fmt::Display for Binding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "queue '{}' -> exchange '{}' (key '{}')",
      self.queue, self.exchange, self.routing_key
    )
  }
}
