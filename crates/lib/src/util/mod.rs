//! Shared utilities.

pub mod sync;
