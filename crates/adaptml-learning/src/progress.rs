//! Progress reporting for [`Trainer::train()`](crate::Trainer::train).
//!
//! A training run moves through a fixed sequence of [`TrainingStage`]s and
//! reports each transition to an optional [`ProgressCallback`]. Callbacks
//! run synchronously on the training thread.
//!
//! # Example
//!
//! ```no_run
//! use adaptml_learning::{FileArtifactStore, ProgressUpdate, Trainer};
//!
//! let trainer = Trainer::builder()
//!     .store(FileArtifactStore::new("models"))
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//!     })
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The current stage of a training run.
///
/// Stages run in declaration order. [`Complete`](Self::Complete) and
/// [`Failed`](Self::Failed) are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    /// Target encoding, split and preprocessing fit.
    #[default]
    Preparing,

    /// Ranking candidates when no algorithm was requested.
    AlgorithmSelection,

    /// Fitting the estimator on the training partition.
    Training,

    /// Held-out metrics and feature importance.
    Evaluation,

    /// Writing the artifact.
    Saving,

    Complete,

    /// Nothing was persisted.
    Failed,
}

impl TrainingStage {
    pub const ALL: [TrainingStage; 7] = [
        TrainingStage::Preparing,
        TrainingStage::AlgorithmSelection,
        TrainingStage::Training,
        TrainingStage::Evaluation,
        TrainingStage::Saving,
        TrainingStage::Complete,
        TrainingStage::Failed,
    ];

    /// ```
    /// use adaptml_learning::TrainingStage;
    ///
    /// assert_eq!(TrainingStage::AlgorithmSelection.as_str(), "algorithm_selection");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Preparing => "preparing",
            TrainingStage::AlgorithmSelection => "algorithm_selection",
            TrainingStage::Training => "training",
            TrainingStage::Evaluation => "evaluation",
            TrainingStage::Saving => "saving",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStage::Complete | TrainingStage::Failed)
    }

    /// Overall progress when the stage starts.
    pub(crate) fn progress(&self) -> f64 {
        match self {
            TrainingStage::Preparing => 0.0,
            TrainingStage::AlgorithmSelection => 0.2,
            TrainingStage::Training => 0.3,
            TrainingStage::Evaluation => 0.7,
            TrainingStage::Saving => 0.9,
            TrainingStage::Complete | TrainingStage::Failed => 1.0,
        }
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`TrainingStage::from_str()`] for an unknown stage name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingStageError {
    invalid_value: String,
}

impl ParseTrainingStageError {
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl fmt::Display for ParseTrainingStageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = TrainingStage::ALL.iter().map(|s| s.as_str()).collect();
        write!(
            f,
            "invalid training stage: '{}'. Valid values are: {}",
            self.invalid_value,
            valid.join(", ")
        )
    }
}

impl std::error::Error for ParseTrainingStageError {}

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrainingStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ParseTrainingStageError {
                invalid_value: s.to_string(),
            })
    }
}

/// One progress report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0, non-decreasing within a run.
    pub progress: f64,

    pub message: String,

    /// Algorithm token once one has been chosen.
    pub algorithm: Option<String>,
}

/// Receives [`ProgressUpdate`]s. Must return quickly; it runs inline.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_stage_roundtrip() {
        for stage in TrainingStage::ALL {
            let parsed: TrainingStage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_training_stage_from_str_rejects_unknown() {
        let err = "cancelled".parse::<TrainingStage>().unwrap_err();
        assert_eq!(err.invalid_value(), "cancelled");
        assert!(err.to_string().contains("Valid values"));
    }

    #[test]
    fn test_training_stage_is_terminal() {
        assert!(TrainingStage::Complete.is_terminal());
        assert!(TrainingStage::Failed.is_terminal());
        assert!(!TrainingStage::Saving.is_terminal());
    }

    #[test]
    fn test_stage_progress_is_monotonic() {
        let progress: Vec<f64> = TrainingStage::ALL[..6].iter().map(|s| s.progress()).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(TrainingStage::Complete.progress(), 1.0);
    }

    #[test]
    fn test_progress_update_default() {
        let update = ProgressUpdate::default();
        assert_eq!(update.stage, TrainingStage::Preparing);
        assert_eq!(update.progress, 0.0);
        assert!(update.algorithm.is_none());
    }
}
