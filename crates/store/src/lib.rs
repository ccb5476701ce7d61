//! SQL storage layer: pool construction, schema migrations, the time-range
//! partition manager, and row types shared across services.

pub mod partitions;
pub mod pool;
pub mod rows;

pub use pool::{connect, migrate};
