//! Exchange and queue records.
//!
//! # Submodules
//!
//! - [`registry`] - name to record maps and anonymous queue naming
//! - `types` - definitions, lifecycle state and entity keys

pub mod registry;
mod types;

pub use registry::EntityRegistry;
pub use types::*;
