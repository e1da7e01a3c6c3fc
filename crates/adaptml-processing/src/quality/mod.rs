//! Data quality scoring.
//!
//! Two views of quality live here: the weighted sub-score composite stored
//! on every profile, and the issue list with penalty score used when
//! characterizing a dataset.

mod analyzer;

pub use analyzer::{CellCounts, DataQualityAnalyzer};
pub(crate) use analyzer::has_many_outliers;
