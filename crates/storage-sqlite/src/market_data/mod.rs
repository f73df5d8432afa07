//! SQLite storage for price bars.

mod model;
mod repository;

pub use model::{format_ts, NewPriceBarDB, PriceBarDB};
pub use repository::BarRepository;
