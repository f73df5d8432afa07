//! Bar persistence boundary.

mod dry_run;
mod store;

pub use dry_run::DryRunBarStore;
pub use store::{BarStore, UpsertSummary};
