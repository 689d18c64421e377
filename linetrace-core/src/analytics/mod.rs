//! Analytics module for linetrace
//!
//! Turns recorded diff lines into adoption metrics:
//! - [`adoption`]: LCS line survival and the rate formulas
//! - [`cache`]: TTL cache for computed reports
//! - [`engine`]: [`MetricsContext`], which aggregates per session, file,
//!   project or globally
//!
//! See [`engine`] for the aggregation algorithm.

pub mod adoption;
pub mod cache;
pub mod engine;

pub use adoption::{adoption_rate, generation_rate, round2, DynamicLcs, LcsMatcher};
pub use cache::{ResultCache, DEFAULT_TTL};
pub use engine::MetricsContext;
