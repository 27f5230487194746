//! Names and limits shared across the crate.

/// Application name, used for data directory layout.
pub const APP_NAME: &str = "warren";

/// Name of the default exchange. Every queue is reachable through it by its own name.
pub const DEFAULT_EXCHANGE: &str = "";

/// Prefix reserved for broker-defined entities.
pub const RESERVED_PREFIX: &str = "amq.";

/// Prefix used for server-generated queue names.
pub const GENERATED_QUEUE_PREFIX: &str = "amq.gen-";

/// Exchanges present on every boot. `(name, kind)`.
pub const BUILTIN_EXCHANGES: &[(&str, &str)] = &[
  (DEFAULT_EXCHANGE, "direct"),
  ("amq.direct", "direct"),
  ("amq.fanout", "fanout"),
  ("amq.topic", "topic"),
];

/// Journal entries appended between automatic compactions.
pub const DEFAULT_COMPACT_AFTER: usize = 4096;

/// Maximum length of an exchange or queue name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Whether `name` is one of the [`BUILTIN_EXCHANGES`].
pub fn is_builtin_exchange(name: &str) -> bool {
  BUILTIN_EXCHANGES.iter().any(|(builtin, _)| *builtin == name)
}
