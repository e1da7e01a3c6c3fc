//! Pairwise correlation and target leakage detection.

use std::collections::BTreeMap;

use super::statistics::pearson;
use crate::types::{LeakageReason, LeakageWarning};
use crate::utils::round_to;

/// Pearson correlation for every numeric pair, in column order.
///
/// Each unordered pair is visited once (`i < j`), so a column is never
/// paired with itself and `(b, a)` never duplicates `(a, b)`. Values are
/// rounded to 3 decimals and only kept when `|r| > threshold`.
pub(crate) fn numeric_correlations(
    columns: &[(String, Vec<Option<f64>>)],
    threshold: f64,
) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let (name_a, values_a) = &columns[i];
            let (name_b, values_b) = &columns[j];
            if let Some(r) = pearson(values_a, values_b)
                && r.abs() > threshold
            {
                out.insert(pair_key(name_a, name_b), round_to(r, 3));
            }
        }
    }
    out
}

/// Key for an ordered column pair: `a|b`, with `\` and `|` inside names
/// escaped by a backslash so distinct pairs never share a key.
pub fn pair_key(a: &str, b: &str) -> String {
    fn escape(name: &str) -> String {
        name.replace('\\', "\\\\").replace('|', "\\|")
    }
    format!("{}|{}", escape(a), escape(b))
}

/// Columns that reveal the target: near-perfect correlation or identical
/// values.
pub(crate) fn detect_leakage(
    target: &str,
    target_text: &[Option<String>],
    target_numeric: Option<&[Option<f64>]>,
    candidates: &[(String, Vec<Option<String>>, Option<Vec<Option<f64>>>)],
    threshold: f64,
) -> Vec<LeakageWarning> {
    let mut warnings = Vec::new();

    for (name, text, numeric) in candidates {
        if name == target {
            continue;
        }

        if text.as_slice() == target_text {
            warnings.push(LeakageWarning {
                column: name.clone(),
                target: target.to_string(),
                reason: LeakageReason::IdenticalValues,
                correlation: None,
                message: format!("Column '{name}' is identical to target '{target}'"),
            });
            continue;
        }

        if let (Some(values), Some(target_values)) = (numeric, target_numeric)
            && let Some(r) = pearson(values, target_values)
            && r.abs() > threshold
        {
            warnings.push(LeakageWarning {
                column: name.clone(),
                target: target.to_string(),
                reason: LeakageReason::HighCorrelation,
                correlation: Some(round_to(r, 3)),
                message: format!(
                    "Column '{name}' has correlation {:.3} with target '{target}'",
                    r
                ),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(name: &str, values: &[f64]) -> (String, Vec<Option<f64>>) {
        (name.to_string(), values.iter().map(|v| Some(*v)).collect())
    }

    #[test]
    fn test_correlations_threshold_and_pairs() {
        let columns = vec![
            numeric("a", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            numeric("b", &[2.0, 4.0, 6.0, 8.0, 10.5]),
            numeric("c", &[3.0, 1.0, 4.0, 1.0, 5.0]),
        ];
        let corr = numeric_correlations(&columns, 0.3);

        assert!(corr.contains_key(&pair_key("a", "b")));
        assert!(!corr.contains_key(&pair_key("b", "a")));
        assert!(!corr.contains_key(&pair_key("a", "a")));
        assert!(corr.values().all(|r| r.abs() > 0.3));
    }

    #[test]
    fn test_underscored_names_keep_distinct_pairs() {
        let columns = vec![
            numeric("a_b", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            numeric("c", &[5.0, 4.2, 2.9, 2.1, 0.8]),
            numeric("a", &[-1.0, -2.1, -2.9, -4.2, -5.0]),
            numeric("b_c", &[1.1, 1.9, 3.2, 3.8, 5.1]),
        ];
        let corr = numeric_correlations(&columns, 0.3);

        assert_eq!(corr.len(), 6);
        assert_ne!(pair_key("a_b", "c"), pair_key("a", "b_c"));
        assert!(corr[&pair_key("a_b", "c")] < 0.0);
        assert!(corr[&pair_key("a", "b_c")] < 0.0);
        assert!(corr[&pair_key("a_b", "b_c")] > 0.0);
    }

    #[test]
    fn test_pair_key_escapes_separator() {
        assert_eq!(pair_key("x", "y"), "x|y");
        assert_ne!(pair_key("a|b", "c"), pair_key("a", "b|c"));
        assert_ne!(pair_key("a\\", "|b"), pair_key("a\\|", "b"));
    }

    #[test]
    fn test_leakage_identical_column() {
        let target_text = vec![Some("1".to_string()), Some("0".to_string())];
        let candidates = vec![(
            "copy".to_string(),
            target_text.clone(),
            None::<Vec<Option<f64>>>,
        )];
        let warnings = detect_leakage("y", &target_text, None, &candidates, 0.95);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, LeakageReason::IdenticalValues);
    }

    #[test]
    fn test_leakage_high_correlation() {
        let target: Vec<Option<f64>> = (0..20).map(|i| Some(i as f64)).collect();
        let target_text: Vec<Option<String>> = target.iter().map(|v| v.map(|x| x.to_string())).collect();
        let leak: Vec<Option<f64>> = (0..20).map(|i| Some(i as f64 * 3.0 + 0.1)).collect();
        let leak_text: Vec<Option<String>> = leak.iter().map(|v| v.map(|x| x.to_string())).collect();
        let candidates = vec![("leak".to_string(), leak_text, Some(leak))];

        let warnings = detect_leakage("y", &target_text, Some(&target), &candidates, 0.95);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, LeakageReason::HighCorrelation);
        assert_eq!(warnings[0].correlation, Some(1.0));
    }
}
