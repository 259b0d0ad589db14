//! JSON-file warm tier.
//!
//! One file per session key under the sessions directory, named
//! `{room_id}__{persona}.json`. Personas are reduced to `[A-Za-z0-9_-]`; when
//! that changes the name, a short SHA-256 suffix keeps distinct personas in
//! distinct files.
//!
//! Writes go to `<file>.json.tmp`, are synced, then renamed over the target,
//! so a crash leaves either the old record or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use turnstile_core::session::{WarmEntry, WarmStore};
use turnstile_types::error::PersistenceError;
use turnstile_types::session::{PersistedRecord, SessionKey};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Warm tier backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileWarmStore {
    dir: PathBuf,
}

impl JsonFileWarmStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `key`.
    pub fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(file_name(key))
    }

    /// Resolve a location reported by `scan` to a path inside the directory.
    fn resolve_location(&self, location: &str) -> Option<PathBuf> {
        let path = Path::new(location);
        if path.parent() == Some(self.dir.as_path()) {
            return Some(path.to_path_buf());
        }
        // A bare file name; joining an absolute path yields it unchanged.
        let joined = self.dir.join(path);
        (joined.parent() == Some(self.dir.as_path())).then_some(joined)
    }
}

/// File name for `key`: `{room_id}__{persona}.json`.
pub fn file_name(key: &SessionKey) -> String {
    let sanitized: String = key
        .persona_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized != key.persona_id {
        let digest = Sha256::digest(key.persona_id.as_bytes());
        let suffix: String = format!("{:x}", digest).chars().take(8).collect();
        format!("{}__{sanitized}-{suffix}.{RECORD_EXTENSION}", key.room_id)
    } else {
        format!("{}__{sanitized}.{RECORD_EXTENSION}", key.room_id)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn parse_record(path: &Path, content: &str) -> Result<PersistedRecord, PersistenceError> {
    serde_json::from_str(content).map_err(|e| PersistenceError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

impl WarmStore for JsonFileWarmStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<PersistedRecord>, PersistenceError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        parse_record(&path, &content).map(Some)
    }

    async fn save(&self, record: &PersistedRecord) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let path = self.path_for(&record.key());
        let temp_path = path.with_extension(TEMP_EXTENSION);
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        // Write to temp file first
        {
            let mut file = tokio::fs::File::create(&temp_path)
                .await
                .map_err(|e| io_error(&temp_path, e))?;
            file.write_all(&json)
                .await
                .map_err(|e| io_error(&temp_path, e))?;
            file.sync_all()
                .await
                .map_err(|e| io_error(&temp_path, e))?;
        }

        // Atomic rename
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_error(&path, e));
        }

        debug!(path = %path.display(), "persisted session record");
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<bool, PersistenceError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn scan(&self) -> Result<Vec<WarmEntry>, PersistenceError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_error(&self.dir, e))? {
            let path = entry.path();
            // Skips in-flight `.json.tmp` writes as well as foreign files.
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                // Removed between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read persisted session");
                    continue;
                }
            };

            match parse_record(&path, &content) {
                Ok(record) => entries.push(WarmEntry::Record {
                    record,
                    location: path.display().to_string(),
                }),
                Err(_) => entries.push(WarmEntry::Corrupt {
                    location: path.display().to_string(),
                }),
            }
        }
        Ok(entries)
    }

    async fn discard(&self, location: &str) -> Result<(), PersistenceError> {
        let Some(path) = self.resolve_location(location) else {
            return Err(PersistenceError::Io {
                path: location.to_string(),
                source: std::io::Error::new(
                    ErrorKind::InvalidInput,
                    "location is outside the sessions directory",
                ),
            });
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
