//! OracleBot Library
//!
//! Median spot/rate oracle that publishes option mark snapshots on-chain

pub mod bot;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod oracle;
pub mod persistence;
pub mod types;

pub use bot::{CycleReport, CycleSources, OracleBot, Origin};
pub use error::{OracleError, Result};
