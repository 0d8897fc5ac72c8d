//! # camviz_analysis
//!
//! Aggregate statistics over the classifications made in one session.
//!
//! This crate provides:
//! - [`SessionStats`], a process-scoped aggregator with bounded rolling windows
//! - [`StatsSummary`], its serializable snapshot
//! - [`SessionResults`], the per-image result log with CSV export

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod results;
mod stats;

pub use results::{Result, ResultsError, SessionResult, SessionResults, CSV_HEADER};
pub use stats::{RollingWindow, SessionStats, StatsSummary, WINDOW_CAPACITY};
