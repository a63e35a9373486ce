//! Diversity Ranker Library
//!
//! Load an institutional diversity dataset once, then filter, rank, summarize
//! and export it for a chosen diversity metric.

pub mod analyzer;
pub mod config;
pub mod detail;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod models;
pub mod ranking;
pub mod summary;

pub use error::{DiversityError, Result};
pub use models::{Classification, ClassificationSet, Dataset, InstitutionRecord, Level, Metric};
