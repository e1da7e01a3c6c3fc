//! Imputation module for handling missing values.
//!
//! This module provides various imputation strategies including:
//! - KNN imputation
//! - Statistical imputation (mean, median, most frequent, constant)

mod knn;
mod statistical;

pub use knn::KNNImputer;
pub use statistical::{CategoricalImputer, StatisticalImputer};
