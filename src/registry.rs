//! History of trained models: a SQLite index plus one snapshot file per model.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use thiserror::Error;

use crate::app_dirs;
use crate::atomic_write::write_atomic;
use crate::classifier::ModelArtifact;
use crate::corpus::StrategyKind;
use crate::install::sha256_hex;

/// Filename of the history index stored under the app root.
pub const HISTORY_DB_FILE_NAME: &str = "history.db";

const SNAPSHOT_EXTENSION: &str = "model";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to resolve history directory: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
    #[error("Model history query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("Model history metadata parse failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read model snapshot {path}: {source}")]
    ReadSnapshot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write model snapshot {path}: {source}")]
    WriteSnapshot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove model snapshot {path}: {source}")]
    RemoveSnapshot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No model with id {0} in history")]
    UnknownModel(String),
}

/// One trained model in the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    /// Seconds since the Unix epoch.
    pub created_at: i64,
    pub train_files: Vec<String>,
    pub train_samples: usize,
    /// Accuracy on held-out rows, when a holdout was evaluated.
    pub holdout_accuracy: Option<f64>,
    pub neutral_strategy: StrategyKind,
    pub notes: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub snapshot_path: PathBuf,
}

/// Metadata supplied when recording a model.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub train_files: Vec<PathBuf>,
    pub train_samples: usize,
    pub holdout_accuracy: Option<f64>,
    pub neutral_strategy: StrategyKind,
    pub notes: String,
}

pub struct ModelRegistry {
    connection: Connection,
    snapshot_dir: PathBuf,
}

impl ModelRegistry {
    /// Open the history under the app root.
    pub fn open_default() -> Result<Self, RegistryError> {
        let db_path = app_dirs::app_root_dir()?.join(HISTORY_DB_FILE_NAME);
        Self::open(&db_path, &app_dirs::history_dir()?)
    }

    /// Open (creating if needed) the index at `db_path`, keeping snapshots in
    /// `snapshot_dir`.
    pub fn open(db_path: &Path, snapshot_dir: &Path) -> Result<Self, RegistryError> {
        for dir in [db_path.parent(), Some(snapshot_dir)].into_iter().flatten() {
            std::fs::create_dir_all(dir).map_err(|source| app_dirs::AppDirError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let connection = Connection::open(db_path)?;
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS models (
                model_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                train_files_json TEXT NOT NULL,
                train_samples INTEGER NOT NULL,
                holdout_accuracy REAL,
                neutral_strategy TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                sha256 TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                snapshot_file TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            connection,
            snapshot_dir: snapshot_dir.to_path_buf(),
        })
    }

    /// Snapshot `artifact` and index it.
    pub fn record(&self, artifact: &ModelArtifact, model: NewModel) -> Result<ModelRecord, RegistryError> {
        let id = uuid::Uuid::new_v4().to_string();
        let snapshot_file = format!("{id}.{SNAPSHOT_EXTENSION}");
        let snapshot_path = self.snapshot_dir.join(&snapshot_file);
        write_atomic(&snapshot_path, artifact.as_bytes()).map_err(|source| {
            RegistryError::WriteSnapshot {
                path: snapshot_path.clone(),
                source,
            }
        })?;
        let record = ModelRecord {
            id,
            name: model.name,
            created_at: now_epoch_seconds(),
            train_files: model
                .train_files
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            train_samples: model.train_samples,
            holdout_accuracy: model.holdout_accuracy,
            neutral_strategy: model.neutral_strategy,
            notes: model.notes,
            sha256: sha256_hex(artifact.as_bytes()),
            size_bytes: artifact.len() as u64,
            snapshot_path,
        };
        self.connection.execute(
            "INSERT INTO models (
                model_id, name, created_at, train_files_json, train_samples,
                holdout_accuracy, neutral_strategy, notes, sha256, size_bytes, snapshot_file
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.name,
                record.created_at,
                serde_json::to_string(&record.train_files)?,
                record.train_samples as i64,
                record.holdout_accuracy,
                record.neutral_strategy.as_str(),
                record.notes,
                record.sha256,
                record.size_bytes as i64,
                snapshot_file,
            ],
        )?;
        tracing::info!("Recorded model {} in history", record.id);
        Ok(record)
    }

    /// All models, newest first. Rows whose snapshot file is gone are dropped
    /// from the index.
    pub fn list(&self) -> Result<Vec<ModelRecord>, RegistryError> {
        let mut stmt = self.connection.prepare(
            "SELECT model_id, name, created_at, train_files_json, train_samples,
                    holdout_accuracy, neutral_strategy, notes, sha256, size_bytes, snapshot_file
             FROM models
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| self.row_to_record(row))?;
        let mut records = Vec::new();
        let mut missing = Vec::new();
        for row in rows {
            let record = row??;
            if record.snapshot_path.is_file() {
                records.push(record);
            } else {
                missing.push(record.id);
            }
        }
        for id in missing {
            tracing::warn!("Dropping history entry {id}: snapshot file is missing");
            self.connection
                .execute("DELETE FROM models WHERE model_id = ?1", params![id])?;
        }
        Ok(records)
    }

    pub fn get(&self, id: &str) -> Result<ModelRecord, RegistryError> {
        self.connection
            .query_row(
                "SELECT model_id, name, created_at, train_files_json, train_samples,
                        holdout_accuracy, neutral_strategy, notes, sha256, size_bytes, snapshot_file
                 FROM models WHERE model_id = ?1",
                params![id],
                |row| self.row_to_record(row),
            )
            .optional()?
            .ok_or_else(|| RegistryError::UnknownModel(id.to_string()))?
    }

    /// Read a model's snapshot back as an artifact.
    pub fn load_artifact(&self, id: &str) -> Result<(ModelRecord, ModelArtifact), RegistryError> {
        let record = self.get(id)?;
        let bytes = std::fs::read(&record.snapshot_path).map_err(|source| RegistryError::ReadSnapshot {
            path: record.snapshot_path.clone(),
            source,
        })?;
        Ok((record, ModelArtifact::new(bytes)))
    }

    /// Delete a model's snapshot and its index row.
    pub fn remove(&self, id: &str) -> Result<ModelRecord, RegistryError> {
        let record = self.get(id)?;
        match std::fs::remove_file(&record.snapshot_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RegistryError::RemoveSnapshot {
                    path: record.snapshot_path.clone(),
                    source,
                });
            }
        }
        self.connection
            .execute("DELETE FROM models WHERE model_id = ?1", params![id])?;
        Ok(record)
    }

    fn row_to_record(&self, row: &Row<'_>) -> rusqlite::Result<Result<ModelRecord, RegistryError>> {
        let train_files_json: String = row.get(3)?;
        let strategy: String = row.get(6)?;
        let snapshot_file: String = row.get(10)?;
        let id: String = row.get(0)?;
        let train_files = match serde_json::from_str::<Vec<String>>(&train_files_json) {
            Ok(files) => files,
            Err(err) => return Ok(Err(err.into())),
        };
        let neutral_strategy = strategy.parse::<StrategyKind>().unwrap_or_else(|err| {
            tracing::warn!("History entry {id}: {err}");
            StrategyKind::default()
        });
        Ok(Ok(ModelRecord {
            id,
            name: row.get(1)?,
            created_at: row.get(2)?,
            train_files,
            train_samples: row.get::<_, i64>(4)?.max(0) as usize,
            holdout_accuracy: row.get(5)?,
            neutral_strategy,
            notes: row.get(7)?,
            sha256: row.get(8)?,
            size_bytes: row.get::<_, i64>(9)?.max(0) as u64,
            snapshot_path: self.snapshot_dir.join(snapshot_file),
        }))
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
