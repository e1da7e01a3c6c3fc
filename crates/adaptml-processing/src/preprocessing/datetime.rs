//! Date/time component extraction.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::profiler::statistics;

/// Sub-features extracted from every datetime column, in output order.
pub const DATETIME_PARTS: [&str; 6] = ["year", "month", "day", "weekday", "hour", "is_weekend"];

/// Splits timestamps into numeric parts. Missing or unparseable values get
/// the training median of each part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatetimeExtractor {
    fill: Vec<[f64; 6]>,
}

/// Monday is 0, matching the usual weekday numbering of dataframe tools.
fn parts(dt: &NaiveDateTime) -> [f64; 6] {
    let weekday = dt.weekday().num_days_from_monday();
    [
        dt.year() as f64,
        dt.month() as f64,
        dt.day() as f64,
        weekday as f64,
        dt.hour() as f64,
        if weekday >= 5 { 1.0 } else { 0.0 },
    ]
}

pub fn output_names(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .flat_map(|c| DATETIME_PARTS.iter().map(move |p| format!("{c}_{p}")))
        .collect()
}

impl DatetimeExtractor {
    pub fn fit(columns: &[Vec<Option<NaiveDateTime>>]) -> Self {
        let fill = columns
            .iter()
            .map(|col| {
                let extracted: Vec<[f64; 6]> = col.iter().flatten().map(parts).collect();
                let mut fill = [0.0; 6];
                for (i, slot) in fill.iter_mut().enumerate() {
                    let values: Vec<f64> = extracted.iter().map(|p| p[i]).collect();
                    *slot = statistics::median(&values).unwrap_or(0.0);
                }
                fill
            })
            .collect();
        Self { fill }
    }

    /// Six output columns per input column.
    pub fn transform(&self, columns: &[Vec<Option<NaiveDateTime>>]) -> Vec<Vec<f64>> {
        let mut out = Vec::with_capacity(columns.len() * DATETIME_PARTS.len());
        for (col, fill) in columns.iter().zip(&self.fill) {
            let rows: Vec<[f64; 6]> = col
                .iter()
                .map(|v| v.as_ref().map(parts).unwrap_or(*fill))
                .collect();
            for i in 0..DATETIME_PARTS.len() {
                out.push(rows.iter().map(|p| p[i]).collect());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_datetime;

    #[test]
    fn test_parts_of_saturday() {
        let dt = parse_datetime("2024-03-16 14:30:00").unwrap();
        assert_eq!(parts(&dt), [2024.0, 3.0, 16.0, 5.0, 14.0, 1.0]);
    }

    #[test]
    fn test_missing_uses_training_median() {
        let train = vec![vec![
            parse_datetime("2024-01-01"),
            parse_datetime("2024-01-03"),
            parse_datetime("2024-01-05"),
        ]];
        let extractor = DatetimeExtractor::fit(&train);
        let out = extractor.transform(&[vec![None]]);
        assert_eq!(out.len(), 6);
        assert_eq!(out[2], vec![3.0]);
        assert_eq!(out[0], vec![2024.0]);
    }

    #[test]
    fn test_output_names() {
        assert_eq!(
            output_names(&["signup".to_string()])[5],
            "signup_is_weekend".to_string()
        );
    }
}
