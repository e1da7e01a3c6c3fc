//! Structural validation of a loaded dataset.

use polars::prelude::*;
use std::collections::HashSet;

use crate::types::StructureReport;

/// Datasets wider than this are reported as malformed.
pub const MAX_COLUMNS: usize = 1000;

/// Check a dataset for structural problems.
///
/// Problems are collected into the report; this never fails.
pub fn validate_structure(df: &DataFrame) -> StructureReport {
    let mut issues = Vec::new();

    if df.height() == 0 || df.width() == 0 {
        issues.push("Dataset is empty".to_string());
    }

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let unnamed: Vec<&String> = names
        .iter()
        .filter(|n| n.trim().is_empty() || n.starts_with("Unnamed:"))
        .collect();
    if !unnamed.is_empty() {
        issues.push(format!("Found {} unnamed columns", unnamed.len()));
    }

    // readers rename repeated headers with a "_duplicated_N" suffix
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for name in &names {
        let base = match name.find("_duplicated_") {
            Some(pos) => &name[..pos],
            None => name.as_str(),
        };
        if !seen.insert(base.to_string()) || base != name {
            duplicates.push(base.to_string());
        }
    }
    if !duplicates.is_empty() {
        duplicates.sort();
        duplicates.dedup();
        issues.push(format!("Duplicate column names: {}", duplicates.join(", ")));
    }

    if names.len() > MAX_COLUMNS {
        issues.push(format!(
            "Too many columns ({}), maximum supported is {}",
            names.len(),
            MAX_COLUMNS
        ));
    }

    StructureReport {
        is_valid: issues.is_empty(),
        issues,
    }
}

/// Report for a file that could not be read at all.
pub fn unreadable(reason: impl std::fmt::Display) -> StructureReport {
    StructureReport {
        is_valid: false,
        issues: vec![format!("File could not be parsed: {reason}")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_dataset() {
        let df = df!("a" => &[1, 2], "b" => &["x", "y"]).unwrap();
        let report = validate_structure(&df);
        assert!(report.is_valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_empty_dataset() {
        let df = DataFrame::empty();
        let report = validate_structure(&df);
        assert!(!report.is_valid);
        assert!(report.issues[0].contains("empty"));
    }

    #[test]
    fn test_unnamed_and_duplicate_columns() {
        let df = df!(
            "Unnamed: 0" => &[1, 2],
            "a" => &[1, 2],
            "a_duplicated_0" => &[3, 4]
        )
        .unwrap();
        let report = validate_structure(&df);
        assert!(!report.is_valid);
        assert!(report.issues.iter().any(|i| i.contains("unnamed")));
        assert!(report.issues.iter().any(|i| i.contains("Duplicate column names: a")));
    }
}
