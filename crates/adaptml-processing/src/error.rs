//! Error types for profiling, characterization and preprocessing.
//!
//! Every error carries an [`ErrorKind`] chosen where the variant is defined,
//! so callers (and the transport layer) can branch on the kind without ever
//! inspecting message text.
//!
//! Errors are serializable as `{code, kind, message}` so they can cross the
//! transport boundary as plain data.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigValidationError;

/// Closed taxonomy of failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad column, out-of-range parameter, unsupported token.
    Validation,
    /// Unknown session, model id, or a half-present artifact.
    NotFound,
    /// Numeric computation or file parsing failed.
    Computation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotFound => "not_found_error",
            Self::Computation => "computation_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for the processing crate.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// A parameter or token supplied by the caller is not acceptable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The dataset has no rows or no usable columns.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// No dataset is registered under the given session.
    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    /// A value could not be interpreted as the column's fitted kind.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// Profiling failed for the whole dataset.
    #[error("Failed to profile dataset: {0}")]
    ProfilingFailed(String),

    /// A preprocessing step failed while fitting or transforming.
    #[error("Preprocessing failed in step '{step}': {reason}")]
    PreprocessingFailed { step: String, reason: String },

    /// Text generation client error.
    #[error("AI client error: {0}")]
    AiClientError(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with the "ai" feature).
    #[cfg(feature = "ai")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a [`ProcessingError::PreprocessingFailed`].
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        ProcessingError::PreprocessingFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code for callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::ProfilingFailed(_) => "PROFILING_FAILED",
            Self::PreprocessingFailed { .. } => "PREPROCESSING_FAILED",
            Self::AiClientError(_) => "AI_CLIENT_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ColumnNotFound(_)
            | Self::InvalidConfig(_)
            | Self::InvalidInput(_)
            | Self::EmptyDataset => ErrorKind::Validation,
            Self::SessionNotFound(_) => ErrorKind::NotFound,
            Self::TypeConversionFailed { .. }
            | Self::ProfilingFailed(_)
            | Self::PreprocessingFailed { .. }
            | Self::AiClientError(_)
            | Self::Io(_)
            | Self::Polars(_)
            | Self::Json(_) => ErrorKind::Computation,
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => ErrorKind::Computation,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Validation and not-found failures leave nothing half done; the caller
    /// can fix the input and call again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}
