//! Error types for the adaptml-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Handling
//!
//! Errors are designed to be:
//! - **Descriptive**: Each variant includes context about what went wrong
//! - **Classified**: Each variant maps to one [`ErrorKind`], decided here and
//!   never inferred from message text
//! - **Serializable**: Errors serialize as `{code, kind, message}`
//!
//! # Example
//!
//! ```no_run
//! use adaptml_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<(), LearningError> {
//!     // test_size outside [0.1, 0.5] is a validation error
//!     let config = TrainingConfig::builder()
//!         .target_column("target")
//!         .test_size(0.2)
//!         .build()?;
//!     Ok(())
//! }
//! ```

use adaptml_processing::{ErrorKind, ProcessingError};
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for adaptml-learning operations.
///
/// This enum covers all error conditions that can occur during:
/// - Training configuration and validation
/// - Model recommendation and hyperparameter search
/// - Model training and evaluation
/// - Artifact persistence
/// - Prediction serving
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to the trainer.
    ///
    /// Check the error message for details on which configuration value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or inference.
    ///
    /// Common causes:
    /// - Too few rows to split into train and test partitions
    /// - The target column has no values
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The specified target column was not found in the DataFrame.
    ///
    /// Column names are case-sensitive.
    #[error("Target column '{0}' not found")]
    TargetNotFound(String),

    /// The algorithm token is not known, or not available for the problem type.
    #[error("Unsupported algorithm '{algorithm}' for {problem_type}")]
    UnsupportedAlgorithm {
        algorithm: String,
        problem_type: String,
    },

    /// Training failed while fitting or evaluating.
    ///
    /// The message carries the originating failure.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// No artifact is stored under the model id.
    #[error("Model not found: {model_id}")]
    ModelNotFound {
        /// The id that did not resolve.
        model_id: String,
    },

    /// An artifact exists but cannot be used (missing half, bad record).
    #[error("Inconsistent artifact for model '{model_id}': {reason}")]
    InconsistentArtifact { model_id: String, reason: String },

    /// Artifacts are append-only; the id is already taken.
    #[error("Model '{0}' already exists")]
    ArtifactExists(String),

    /// Prediction rows are missing features the model was trained on.
    #[error("Missing required features: {}", features.join(", "))]
    MissingFeatures {
        /// Exactly the absent features, in training order.
        features: Vec<String>,
    },

    /// An error occurred during inference/prediction.
    ///
    /// Common causes:
    /// - Input values cannot be read as the type the model was trained on
    /// - The input batch is empty
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Failure in profiling or preprocessing.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// I/O error during artifact operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// DataFrame construction or access failure.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl LearningError {
    /// Stable error code for callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::UnsupportedAlgorithm { .. } => "UNSUPPORTED_ALGORITHM",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::InconsistentArtifact { .. } => "INCONSISTENT_ARTIFACT",
            Self::ArtifactExists(_) => "ARTIFACT_EXISTS",
            Self::MissingFeatures { .. } => "MISSING_FEATURES",
            Self::InferenceError(_) => "INFERENCE_ERROR",
            Self::Processing(e) => e.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }

    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_)
            | Self::InvalidData(_)
            | Self::TargetNotFound(_)
            | Self::UnsupportedAlgorithm { .. }
            | Self::ArtifactExists(_)
            | Self::MissingFeatures { .. } => ErrorKind::Validation,
            Self::ModelNotFound { .. } | Self::InconsistentArtifact { .. } => ErrorKind::NotFound,
            Self::TrainingFailed(_)
            | Self::InferenceError(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Polars(_) => ErrorKind::Computation,
            Self::Processing(e) => e.kind(),
        }
    }

    /// Validation and not-found failures can be fixed by the caller and
    /// retried; nothing was persisted.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
    }

    /// Wrap a failure raised while fitting or evaluating. Validation and
    /// not-found errors pass through unchanged.
    pub(crate) fn training(self) -> Self {
        match self.kind() {
            ErrorKind::Computation => match self {
                Self::TrainingFailed(_) => self,
                other => Self::TrainingFailed(other.to_string()),
            },
            _ => self,
        }
    }
}

impl From<adaptml_processing::ConfigValidationError> for LearningError {
    fn from(err: adaptml_processing::ConfigValidationError) -> Self {
        LearningError::InvalidConfig(err.to_string())
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_features_message_lists_names() {
        let err = LearningError::MissingFeatures {
            features: vec!["age".to_string(), "city".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required features: age, city");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_processing_errors_keep_their_kind() {
        let err: LearningError = ProcessingError::SessionNotFound("s".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.error_code(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_training_wraps_only_computation_errors() {
        let io = LearningError::Io(std::io::Error::other("disk"));
        assert!(matches!(io.training(), LearningError::TrainingFailed(_)));

        let target = LearningError::TargetNotFound("y".into());
        assert!(matches!(target.training(), LearningError::TargetNotFound(_)));
    }

    #[test]
    fn test_serializes_code_and_kind() {
        let err = LearningError::ModelNotFound {
            model_id: "model_x".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "MODEL_NOT_FOUND");
        assert_eq!(json["kind"], "not_found");
    }
}
