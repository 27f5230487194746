//! Queue-to-exchange bindings.
//!
//! A binding is a weak association: it names its queue and exchange and owns neither.
//! The [`BindingTable`] indexes the live set both ways so that routing and either kind of
//! cascade can find the affected tuples without a scan.

mod table;
mod types;

pub use table::{BindingNotFound, BindingTable};
pub use types::Binding;
