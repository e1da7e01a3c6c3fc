//! Storage collaborator: maps a session token to a readable tabular file.
//!
//! The core never manages file lifecycle. A [`DatasetStore`] only has to
//! resolve a session to a handle and read that handle into a `DataFrame`.

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ProcessingError, Result};
use crate::profiler::{unreadable, validate_structure};
use crate::types::StructureReport;

// session tokens become file names, so only a safe alphabet is accepted
static SESSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("Invalid regex: session id"));

/// Rows scanned by the CSV reader to infer column dtypes.
const INFER_SCHEMA_ROWS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Parquet,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// A readable tabular file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub path: PathBuf,
    pub format: DataFormat,
}

impl DatasetHandle {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = DataFormat::from_path(&path).ok_or_else(|| {
            ProcessingError::InvalidInput(format!(
                "unsupported file type '{}' (expected .csv or .parquet)",
                path.display()
            ))
        })?;
        Ok(Self { path, format })
    }
}

/// Resolves sessions and reads their datasets.
pub trait DatasetStore: Send + Sync {
    /// `Ok(None)` when no dataset is registered for the session.
    fn resolve(&self, session_id: &str) -> Result<Option<DatasetHandle>>;

    fn read_tabular(&self, handle: &DatasetHandle) -> Result<DataFrame> {
        read_file(handle)
    }

    /// Resolve and read in one step.
    fn load(&self, session_id: &str) -> Result<DataFrame> {
        let handle = self
            .resolve(session_id)?
            .ok_or_else(|| ProcessingError::SessionNotFound(session_id.to_string()))?;
        self.read_tabular(&handle)
    }
}

/// Sessions stored under one directory, either as `{session}.csv` /
/// `{session}.parquet` or as a `{session}/` folder holding one data file.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn validate_session_id(session_id: &str) -> Result<()> {
    if SESSION_ID.is_match(session_id) {
        Ok(())
    } else {
        Err(ProcessingError::InvalidInput(format!(
            "invalid session id '{session_id}'"
        )))
    }
}

impl DatasetStore for DirectoryStore {
    fn resolve(&self, session_id: &str) -> Result<Option<DatasetHandle>> {
        validate_session_id(session_id)?;

        for ext in ["csv", "parquet"] {
            let path = self.root.join(format!("{session_id}.{ext}"));
            if path.is_file() {
                return DatasetHandle::from_path(path).map(Some);
            }
        }

        let dir = self.root.join(session_id);
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && DataFormat::from_path(p).is_some())
            .collect();
        candidates.sort();
        match candidates.into_iter().next() {
            Some(path) => DatasetHandle::from_path(path).map(Some),
            None => Ok(None),
        }
    }
}

/// Read a CSV or Parquet file. CSV reading retries with row-level parse
/// errors ignored before giving up.
pub fn read_file(handle: &DatasetHandle) -> Result<DataFrame> {
    let df = match handle.format {
        DataFormat::Csv => read_csv(&handle.path)?,
        DataFormat::Parquet => ParquetReader::new(File::open(&handle.path)?).finish()?,
    };
    info!(
        "Loaded {} ({} rows x {} columns)",
        handle.path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let strict = CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish();
    match strict {
        Ok(df) => Ok(df),
        Err(e) => {
            debug!("Strict CSV read failed, retrying leniently: {}", e);
            Ok(CsvReadOptions::default()
                .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
                .with_has_header(true)
                .with_ignore_errors(true)
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?)
        }
    }
}

/// Read a file and report its structural problems. An unreadable file is
/// reported as invalid rather than returned as an error.
pub fn inspect_file(path: impl AsRef<Path>) -> StructureReport {
    match DatasetHandle::from_path(path.as_ref()).and_then(|h| read_file(&h)) {
        Ok(df) => validate_structure(&df),
        Err(e) => unreadable(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_resolve_and_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "abc123.csv", "a,b\n1,x\n2,y\n");

        let store = DirectoryStore::new(dir.path());
        let handle = store.resolve("abc123").unwrap().unwrap();
        assert_eq!(handle.format, DataFormat::Csv);

        let df = store.load("abc123").unwrap();
        assert_eq!(df.shape(), (2, 2));
    }

    #[test]
    fn test_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sess-1")).unwrap();
        write_csv(&dir.path().join("sess-1"), "upload.csv", "a\n1\n");

        let store = DirectoryStore::new(dir.path());
        assert!(store.resolve("sess-1").unwrap().is_some());
    }

    #[test]
    fn test_unknown_session_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        assert!(store.resolve("missing").unwrap().is_none());
        let err = store.load("missing").unwrap_err();
        assert_eq!(err.error_code(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_path_like_session_is_rejected() {
        let store = DirectoryStore::new("/tmp");
        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(ProcessingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.parquet");
        let mut df = df! { "x" => [1.0, 2.0, 3.0] }.unwrap();
        let mut file = File::create(&path).unwrap();
        ParquetWriter::new(&mut file).finish(&mut df).unwrap();

        let loaded = read_file(&DatasetHandle::from_path(&path).unwrap()).unwrap();
        assert_eq!(loaded, df);
    }

    #[test]
    fn test_inspect_unreadable_file() {
        let report = inspect_file("/definitely/not/here.csv");
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(DatasetHandle::from_path("data.xlsx").is_err());
    }
}
