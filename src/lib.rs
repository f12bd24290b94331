//! Aggregation and caching engine for monthly facility reports.
//!
//! The source table is a flat export of monthly tallies, one row per
//! facility per report. On top of a time-bounded snapshot of that table the
//! crate serves region/district listings, facility lookups, hierarchical
//! patient and vaccine-stock sums, a rolling completeness matrix, and an
//! allow-list filtered export.
pub mod access;
pub mod aggregate;
pub mod cache;
pub mod completeness;
pub mod config;
pub mod error;
pub mod export;
pub mod identity;
pub mod loader;
pub mod month;
pub mod output;
pub mod service;
pub mod snapshot;
pub mod types;
pub mod util;

pub use error::{Error, Result};
pub use service::MonthlyService;
