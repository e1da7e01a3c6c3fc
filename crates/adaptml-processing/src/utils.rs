//! Shared utilities for profiling and preprocessing.
//!
//! Column values are always read through these helpers so that a column is
//! interpreted the same way at profiling, fitting and prediction time,
//! whatever its physical dtype happens to be.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Check if a DataType is boolean.
#[inline]
pub fn is_boolean_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Boolean)
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Tokens accepted as boolean text.
pub const BOOLEAN_TOKENS: [&str; 10] = [
    "True", "False", "true", "false", "TRUE", "FALSE", "yes", "no", "YES", "NO",
];

/// Check if a string is one of the accepted boolean tokens.
pub fn is_boolean_token(s: &str) -> bool {
    let trimmed = s.trim();
    BOOLEAN_TOKENS.contains(&trimmed)
}

/// Parse a string as a finite number.
///
/// Only plain numeric literals are accepted; currency symbols or thousands
/// separators make the value non-numeric.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y", "%d.%m.%Y"];

/// Parse a string as a date or datetime using the common formats.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// A value looks date-like when it carries a separator; bare digit strings
/// are never treated as dates.
pub fn has_date_separator(s: &str) -> bool {
    s.len() > 6 && s.chars().any(|c| matches!(c, '-' | '/' | ':' | ' '))
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Read every value of a Series as text, preserving nulls.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let as_str = series.cast(&DataType::String)?;
    let chunked = as_str.str()?;
    Ok(chunked
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Read every value of a Series as a number.
///
/// Numeric and boolean dtypes are cast; text is parsed and unparseable
/// values become `None`. Non-finite values also become `None`.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let dtype = series.dtype();
    if is_numeric_dtype(dtype) || is_boolean_dtype(dtype) {
        let cast = series.cast(&DataType::Float64)?;
        return Ok(cast
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect());
    }
    Ok(string_values(series)?
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_numeric_string))
        .collect())
}

/// Like [`numeric_values`], but a non-null value that cannot be read as a
/// number is returned as the error.
pub fn strict_numeric_values(series: &Series) -> PolarsResult<Result<Vec<Option<f64>>, String>> {
    let dtype = series.dtype();
    if is_numeric_dtype(dtype) || is_boolean_dtype(dtype) {
        return numeric_values(series).map(Ok);
    }
    let mut out = Vec::with_capacity(series.len());
    for value in string_values(series)? {
        match value {
            None => out.push(None),
            Some(text) if text.trim().is_empty() => out.push(None),
            Some(text) => match parse_numeric_string(&text) {
                Some(v) => out.push(Some(v)),
                None => return Ok(Err(text)),
            },
        }
    }
    Ok(Ok(out))
}

/// Non-null, finite values of a column in row order.
pub fn finite_values(series: &Series) -> PolarsResult<Vec<f64>> {
    Ok(numeric_values(series)?.into_iter().flatten().collect())
}

/// Read every value of a Series as a timestamp.
pub fn datetime_values(series: &Series) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    Ok(string_values(series)?
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_datetime))
        .collect())
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Count occurrences of each non-null text value.
pub fn value_counts(values: &[Option<String>]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.clone()).or_insert(0) += 1;
    }
    counts
}

/// Counts sorted by descending frequency, ties broken by value.
pub fn sorted_value_counts(values: &[Option<String>]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = value_counts(values).into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// The most frequent value of a string Series; ties go to the smallest value.
pub fn string_mode(series: &Series) -> Option<String> {
    let values = string_values(series).ok()?;
    sorted_value_counts(&values).into_iter().next().map(|(v, _)| v)
}

/// Collect sample values from a Series (non-null values only).
pub fn collect_sample_values(series: &Series, max_samples: usize) -> Vec<String> {
    let non_null = series.drop_nulls();
    if non_null.is_empty() {
        return Vec::new();
    }

    let sample_size = std::cmp::min(max_samples, non_null.len());
    let mut samples = Vec::with_capacity(sample_size);

    for i in 0..sample_size {
        if let Ok(val) = non_null.get(i) {
            samples.push(match val {
                AnyValue::String(s) => s.to_string(),
                AnyValue::StringOwned(s) => s.to_string(),
                other => format!("{}", other),
            });
        }
    }

    samples
}

// =============================================================================
// Output hygiene
// =============================================================================

/// Map non-finite floats to `None` so NaN never leaves the crate.
#[inline]
pub fn finite_or_none(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Round to a fixed number of decimals.
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// =============================================================================
// Tests
// =============================================================================
