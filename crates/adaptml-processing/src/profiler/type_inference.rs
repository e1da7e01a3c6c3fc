//! Type inference logic for column analysis.
//!
//! Inference is a pure function of a column's dtype and non-null values.
//! Checks run in a fixed order and the first match wins:
//! boolean, numerical, datetime, then categorical.

use crate::types::ColumnKind;
use crate::utils::{
    has_date_separator, is_boolean_dtype, is_boolean_token, is_datetime_dtype, is_numeric_dtype,
    parse_datetime, parse_numeric_string, string_values,
};
use polars::prelude::*;

/// Infer the semantic kind of a column.
///
/// `datetime_probe` bounds how many leading non-null values are parsed when
/// testing a text column for dates.
pub fn infer_column_kind(series: &Series, datetime_probe: usize) -> PolarsResult<ColumnKind> {
    if series.null_count() == series.len() {
        return Ok(ColumnKind::Unknown);
    }

    let dtype = series.dtype();
    if is_boolean_dtype(dtype) {
        return Ok(ColumnKind::Boolean);
    }
    if is_numeric_dtype(dtype) {
        return Ok(ColumnKind::Numerical);
    }
    if is_datetime_dtype(dtype) {
        return Ok(ColumnKind::Datetime);
    }

    let values: Vec<String> = string_values(series)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Ok(ColumnKind::Unknown);
    }

    if is_boolean_column(&values) {
        return Ok(ColumnKind::Boolean);
    }
    if is_numeric_column(&values) {
        return Ok(ColumnKind::Numerical);
    }
    if is_datetime_column(&values, datetime_probe) {
        return Ok(ColumnKind::Datetime);
    }
    Ok(ColumnKind::Categorical)
}

/// Every value is one of the boolean tokens.
pub(crate) fn is_boolean_column(values: &[String]) -> bool {
    values.iter().all(|v| is_boolean_token(v))
}

/// Every value parses as a finite number.
pub(crate) fn is_numeric_column(values: &[String]) -> bool {
    values.iter().all(|v| parse_numeric_string(v).is_some())
}

/// The leading sample parses as dates and every sampled value carries a
/// date separator, so numeric-looking strings are not mistaken for dates.
pub(crate) fn is_datetime_column(values: &[String], probe: usize) -> bool {
    let sample: Vec<&String> = values.iter().take(probe.max(1)).collect();
    !sample.is_empty()
        && sample
            .iter()
            .all(|v| has_date_separator(v.trim()) && parse_datetime(v).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(series: Series) -> ColumnKind {
        infer_column_kind(&series, 10).unwrap()
    }

    #[test]
    fn test_native_types() {
        assert_eq!(
            kind(Series::new("a".into(), &[1i64, 0, 1])),
            ColumnKind::Numerical
        );
        assert_eq!(
            kind(Series::new("b".into(), &[true, false])),
            ColumnKind::Boolean
        );
        assert_eq!(
            kind(Series::new("c".into(), &[1.5f64, 2.5])),
            ColumnKind::Numerical
        );
    }

    #[test]
    fn test_boolean_tokens_win_over_categorical() {
        assert_eq!(
            kind(Series::new("flag".into(), &["yes", "no", "YES", "no"])),
            ColumnKind::Boolean
        );
        // "Yes" is not a token, so the column stays categorical
        assert_eq!(
            kind(Series::new("flag".into(), &["Yes", "no"])),
            ColumnKind::Categorical
        );
    }

    #[test]
    fn test_fully_parseable_strings_are_numerical() {
        assert_eq!(
            kind(Series::new("n".into(), &["1", "2.5", "-3"])),
            ColumnKind::Numerical
        );
        assert_eq!(
            kind(Series::new("n".into(), &["1", "2.5", "x"])),
            ColumnKind::Categorical
        );
    }

    #[test]
    fn test_datetime_strings() {
        assert_eq!(
            kind(Series::new(
                "d".into(),
                &["2024-01-01", "2024-02-15", "2024-03-31"]
            )),
            ColumnKind::Datetime
        );
    }

    #[test]
    fn test_digit_strings_are_not_dates() {
        assert_eq!(
            kind(Series::new("d".into(), &["20240101", "20240215"])),
            ColumnKind::Numerical
        );
    }

    #[test]
    fn test_all_null_is_unknown() {
        let series = Series::new("empty".into(), &[None::<&str>, None]);
        assert_eq!(kind(series), ColumnKind::Unknown);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let series = Series::new("mix".into(), &[Some("a"), None, Some("b"), Some("a")]);
        let first = infer_column_kind(&series, 10).unwrap();
        for _ in 0..5 {
            assert_eq!(infer_column_kind(&series, 10).unwrap(), first);
        }
    }
}
