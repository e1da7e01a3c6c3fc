//! Typed reads from a [`Hyperparameters`] map.

use serde_json::Value;

use crate::config::{Algorithm, Hyperparameters};
use crate::error::{LearningError, Result};

/// Reader over the hyperparameters given for one algorithm.
pub(crate) struct Params<'a> {
    algorithm: Algorithm,
    values: &'a Hyperparameters,
}

impl<'a> Params<'a> {
    /// Rejects keys the algorithm does not know.
    pub(crate) fn new(algorithm: Algorithm, values: &'a Hyperparameters, accepted: &[&str]) -> Result<Self> {
        if let Some(unknown) = values.keys().find(|k| !accepted.contains(&k.as_str())) {
            return Err(LearningError::InvalidConfig(format!(
                "unknown hyperparameter '{unknown}' for {algorithm} (accepted: {})",
                accepted.join(", ")
            )));
        }
        Ok(Self { algorithm, values })
    }

    fn invalid(&self, key: &str, expected: &str, value: &Value) -> LearningError {
        LearningError::InvalidConfig(format!(
            "hyperparameter '{key}' for {} must be {expected}, got {value}",
            self.algorithm
        ))
    }

    pub(crate) fn usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.values.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .filter(|&v| v >= 1)
                .map(|v| v as usize)
                .ok_or_else(|| self.invalid(key, "a positive integer", value)),
        }
    }

    /// `null` means unlimited.
    pub(crate) fn optional_usize(&self, key: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.values.get(key) {
            None => Ok(default),
            Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .filter(|&v| v >= 1)
                .map(|v| Some(v as usize))
                .ok_or_else(|| self.invalid(key, "a positive integer or null", value)),
        }
    }

    /// Finite and strictly positive.
    pub(crate) fn positive(&self, key: &str, default: f64) -> Result<f64> {
        match self.values.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| self.invalid(key, "a positive number", value)),
        }
    }

    /// In `(0, 1]`.
    pub(crate) fn fraction(&self, key: &str, default: f64) -> Result<f64> {
        match self.values.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .filter(|v| *v > 0.0 && *v <= 1.0)
                .ok_or_else(|| self.invalid(key, "a number in (0, 1]", value)),
        }
    }

    pub(crate) fn choice(&self, key: &str, default: &'static str, allowed: &[&'static str]) -> Result<&'static str> {
        match self.values.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_str()
                .and_then(|s| allowed.iter().copied().find(|a| a.eq_ignore_ascii_case(s)))
                .ok_or_else(|| self.invalid(key, &format!("one of {}", allowed.join(", ")), value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Hyperparameters {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_reads_and_defaults() {
        let values = params(&[("n_estimators", json!(50)), ("max_depth", Value::Null)]);
        let p = Params::new(Algorithm::RandomForest, &values, &["n_estimators", "max_depth"]).unwrap();
        assert_eq!(p.usize("n_estimators", 100).unwrap(), 50);
        assert_eq!(p.optional_usize("max_depth", Some(3)).unwrap(), None);
        assert_eq!(p.usize("min_samples_leaf", 1).unwrap(), 1);
    }

    #[test]
    fn test_rejects_unknown_key_and_bad_values() {
        let values = params(&[("depth", json!(3))]);
        assert!(Params::new(Algorithm::DecisionTree, &values, &["max_depth"]).is_err());

        let values = params(&[("C", json!(-1.0)), ("weights", json!("cubic"))]);
        let p = Params::new(Algorithm::Knn, &values, &["C", "weights"]).unwrap();
        assert!(p.positive("C", 1.0).is_err());
        assert!(p.choice("weights", "uniform", &["uniform", "distance"]).is_err());
    }
}
