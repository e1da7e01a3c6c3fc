//! Artifact storage: one record per model id holding the fitted pipeline
//! and its metadata.
//!
//! Records are append-only. [`FileArtifactStore`] writes each record to a
//! temporary file and links it into place, so a reader sees either the
//! whole record or nothing, and an existing id is never overwritten.

use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{LearningError, Result};
use crate::model::TrainedModel;
use crate::types::ModelMetadata;

static MODEL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,160}$").expect("Invalid regex: model id"));

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A persisted model: the fitted pipeline and everything known about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_id: String,
    pub pipeline: TrainedModel,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    /// Both halves must describe the same model.
    fn check_consistent(&self) -> Result<()> {
        let inconsistent = |reason: String| LearningError::InconsistentArtifact {
            model_id: self.model_id.clone(),
            reason,
        };
        if self.metadata.model_id != self.model_id {
            return Err(inconsistent(format!(
                "metadata belongs to '{}'",
                self.metadata.model_id
            )));
        }
        if self.metadata.feature_names != self.pipeline.feature_names() {
            return Err(inconsistent(
                "metadata feature names differ from the pipeline's".to_string(),
            ));
        }
        if self.metadata.problem_type != self.pipeline.problem_type() {
            return Err(inconsistent(
                "metadata problem type differs from the pipeline's".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persists and loads [`ModelArtifact`]s keyed by model id.
pub trait ArtifactStore: Send + Sync {
    /// Store a new artifact.
    ///
    /// # Errors
    ///
    /// [`ArtifactExists`](LearningError::ArtifactExists) when the id is
    /// already taken.
    fn save(&self, artifact: &ModelArtifact) -> Result<()>;

    /// # Errors
    ///
    /// - [`ModelNotFound`](LearningError::ModelNotFound): nothing stored under the id
    /// - [`InconsistentArtifact`](LearningError::InconsistentArtifact): a
    ///   record exists but one half is missing or unreadable
    fn load(&self, model_id: &str) -> Result<ModelArtifact>;

    /// Metadata only. The default loads the whole artifact.
    fn metadata(&self, model_id: &str) -> Result<ModelMetadata> {
        self.load(model_id).map(|artifact| artifact.metadata)
    }

    fn exists(&self, model_id: &str) -> Result<bool>;
}

pub fn validate_model_id(model_id: &str) -> Result<()> {
    if MODEL_ID.is_match(model_id) {
        Ok(())
    } else {
        Err(LearningError::InvalidConfig(format!(
            "invalid model id '{model_id}'"
        )))
    }
}

/// Artifacts stored as `{root}/{model_id}.json`.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, model_id: &str) -> PathBuf {
        self.root.join(format!("{model_id}.json"))
    }

    fn read_record(&self, model_id: &str) -> Result<Vec<u8>> {
        validate_model_id(model_id)?;
        match fs::read(self.path_for(model_id)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == IoErrorKind::NotFound => Err(LearningError::ModelNotFound {
                model_id: model_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Model ids in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|id| MODEL_ID.is_match(id))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// A stored record before its halves are checked.
#[derive(Deserialize)]
struct RawRecord {
    model_id: Option<String>,
    pipeline: Option<Value>,
    metadata: Option<Value>,
}

fn half<T: serde::de::DeserializeOwned>(model_id: &str, name: &str, value: Option<Value>) -> Result<T> {
    let value = value.filter(|v| !v.is_null()).ok_or_else(|| LearningError::InconsistentArtifact {
        model_id: model_id.to_string(),
        reason: format!("{name} is missing"),
    })?;
    serde_json::from_value(value).map_err(|e| LearningError::InconsistentArtifact {
        model_id: model_id.to_string(),
        reason: format!("{name} is unreadable: {e}"),
    })
}

fn parse_record(model_id: &str, bytes: &[u8]) -> Result<RawRecord> {
    serde_json::from_slice(bytes).map_err(|e| LearningError::InconsistentArtifact {
        model_id: model_id.to_string(),
        reason: format!("record is unreadable: {e}"),
    })
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let model_id = artifact.model_id.as_str();
        validate_model_id(model_id)?;
        artifact.check_consistent()?;
        fs::create_dir_all(&self.root)?;

        let target = self.path_for(model_id);
        if target.exists() {
            return Err(LearningError::ArtifactExists(model_id.to_string()));
        }

        let temp = self.root.join(format!(
            ".{model_id}.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let bytes = serde_json::to_vec(artifact)?;
        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp)?;
            file.write_all(&bytes)?;
            file.sync_all()
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        // hard_link refuses to replace an existing file
        let linked = fs::hard_link(&temp, &target);
        let _ = fs::remove_file(&temp);
        match linked {
            Ok(()) => {
                info!(model_id, bytes = bytes.len(), "artifact saved");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                Err(LearningError::ArtifactExists(model_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self, model_id: &str) -> Result<ModelArtifact> {
        let bytes = self.read_record(model_id)?;
        let raw = parse_record(model_id, &bytes)?;
        if let Some(stored) = raw.model_id.as_deref()
            && stored != model_id
        {
            return Err(LearningError::InconsistentArtifact {
                model_id: model_id.to_string(),
                reason: format!("record belongs to '{stored}'"),
            });
        }

        let artifact = ModelArtifact {
            model_id: model_id.to_string(),
            pipeline: half(model_id, "pipeline", raw.pipeline)?,
            metadata: half(model_id, "metadata", raw.metadata)?,
        };
        artifact.check_consistent()?;
        debug!(model_id, "artifact loaded");
        Ok(artifact)
    }

    /// Reads the record without deserializing the pipeline. A record whose
    /// pipeline half is missing is still inconsistent.
    fn metadata(&self, model_id: &str) -> Result<ModelMetadata> {
        let bytes = self.read_record(model_id)?;
        let raw = parse_record(model_id, &bytes)?;
        if raw.pipeline.as_ref().is_none_or(Value::is_null) {
            return Err(LearningError::InconsistentArtifact {
                model_id: model_id.to_string(),
                reason: "pipeline is missing".to_string(),
            });
        }
        half(model_id, "metadata", raw.metadata)
    }

    fn exists(&self, model_id: &str) -> Result<bool> {
        validate_model_id(model_id)?;
        Ok(self.path_for(model_id).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_alphabet() {
        assert!(validate_model_id("model_abc12345_20250101_120000").is_ok());
        assert!(validate_model_id("model_x_2").is_ok());
        assert!(validate_model_id("../escape").is_err());
        assert!(validate_model_id("").is_err());
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let err = store.load("model_missing").unwrap_err();
        assert!(matches!(err, LearningError::ModelNotFound { .. }));
        assert!(!store.exists("model_missing").unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_half_record_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("model_half.json"),
            br#"{"model_id": "model_half", "metadata": null}"#,
        )
        .unwrap();
        let store = FileArtifactStore::new(dir.path());

        let err = store.load("model_half").unwrap_err();
        assert!(matches!(err, LearningError::InconsistentArtifact { .. }));
        assert_eq!(err.kind(), adaptml_processing::ErrorKind::NotFound);

        let err = store.metadata("model_half").unwrap_err();
        assert!(err.to_string().contains("pipeline is missing"));
    }

    #[test]
    fn test_garbage_record_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("model_bad.json"), b"not json").unwrap();
        let err = FileArtifactStore::new(dir.path()).load("model_bad").unwrap_err();
        assert!(matches!(err, LearningError::InconsistentArtifact { .. }));
    }
}
