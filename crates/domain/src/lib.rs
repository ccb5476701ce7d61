//! Shared domain types for the Ledger platform: configuration, the common
//! error enum, and the log-event model used by every service.

pub mod config;
pub mod error;
pub mod log;
pub mod telemetry;

pub use error::{Error, Result};
