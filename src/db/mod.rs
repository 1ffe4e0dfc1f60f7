//! SQLite persistence for check results and incident lifecycles.
//!
//! Every operation here is best-effort from the pipeline's point of view:
//! callers log failures and keep going.

mod models;
mod store;

pub use models::*;
pub use store::*;
