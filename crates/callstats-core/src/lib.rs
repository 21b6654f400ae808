//! Domain types for call-center event statistics.
//!
//! Errors, event and key models, the shift classifier, job configuration and
//! command-line settings shared by the data pipeline and the binary.

pub mod error;
pub mod formatting;
pub mod job;
pub mod models;
pub mod settings;
pub mod shifts;

pub use error::{CallStatsError, Result};
