// Persisted change-detection cache

use std::collections::{BTreeMap, HashMap};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::FileRecord;
use crate::config::CacheConfig;
use crate::error::{IndexerError, Result};

/// The validity triple of a file, plus its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime: i64,
    pub size: u64,
    /// blake3 of the full content.
    pub checksum: String,
}

impl FileMetadata {
    pub fn new(path: impl Into<String>, mtime: i64, content: &[u8]) -> Self {
        Self {
            path: path.into(),
            mtime,
            size: content.len() as u64,
            checksum: blake3::hash(content).to_hex().to_string(),
        }
    }

    /// Reads the modification time from filesystem metadata. Filesystems
    /// without one report 0, leaving the checksum to decide.
    pub fn mtime_of(meta: &Metadata) -> i64 {
        meta.modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    pub fn same_content(&self, other: &FileMetadata) -> bool {
        self.mtime == other.mtime && self.size == other.size && self.checksum == other.checksum
    }
}

/// A file record together with the metadata it was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub record: FileRecord,
    pub metadata: FileMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    timestamp: Option<String>,
    files: Vec<CacheEntry>,
}

/// Read-only view of the entries loaded at run start, shareable with
/// worker tasks.
#[derive(Debug, Clone)]
pub struct CacheReader {
    previous: Arc<HashMap<String, CacheEntry>>,
    force_refresh: bool,
}

impl CacheReader {
    pub fn should_reanalyze(&self, current: &FileMetadata) -> bool {
        self.cached(current).is_none()
    }

    /// The stored record, when it is still valid for `current`.
    pub fn cached(&self, current: &FileMetadata) -> Option<&FileRecord> {
        if self.force_refresh {
            return None;
        }
        self.previous
            .get(&current.path)
            .filter(|entry| entry.metadata.same_content(current))
            .map(|entry| &entry.record)
    }
}

/// Owns the cache for one run: loaded once, written once.
#[derive(Debug)]
pub struct ChangeCache {
    path: PathBuf,
    prune_stale: bool,
    reader: CacheReader,
    current: BTreeMap<String, CacheEntry>,
}

impl ChangeCache {
    /// Loads the cache at `path`. Never fails: a missing, unreadable or
    /// malformed file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>, config: &CacheConfig) -> Self {
        let path = path.into();
        let previous = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) => {
                    debug!(
                        "Loaded {} cache entries from {} (written {})",
                        file.files.len(),
                        path.display(),
                        file.timestamp.as_deref().unwrap_or("unknown")
                    );
                    file.files
                        .into_iter()
                        .map(|entry| (entry.metadata.path.clone(), entry))
                        .collect()
                }
                Err(e) => {
                    warn!("Ignoring malformed cache {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cache at {}, analyzing every file", path.display());
                HashMap::new()
            }
            Err(e) => {
                warn!("Could not read cache {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        Self {
            path,
            prune_stale: config.prune_stale,
            reader: CacheReader {
                previous: Arc::new(previous),
                force_refresh: config.force_refresh,
            },
            current: BTreeMap::new(),
        }
    }

    /// Number of entries loaded at run start.
    pub fn loaded(&self) -> usize {
        self.reader.previous.len()
    }

    pub fn reader(&self) -> CacheReader {
        self.reader.clone()
    }

    pub fn should_reanalyze(&self, current: &FileMetadata) -> bool {
        self.reader.should_reanalyze(current)
    }

    /// Stores the result for a file seen in this run.
    pub fn record_result(&mut self, metadata: FileMetadata, record: FileRecord) -> &CacheEntry {
        let key = metadata.path.clone();
        self.current.insert(key.clone(), CacheEntry { record, metadata });
        &self.current[&key]
    }

    /// Writes the cache and returns how many stale entries were dropped.
    /// The file is replaced atomically.
    pub fn persist(&self) -> Result<usize> {
        let stale: Vec<&CacheEntry> = self
            .reader
            .previous
            .iter()
            .filter(|(path, _)| !self.current.contains_key(*path))
            .map(|(_, entry)| entry)
            .collect();

        let mut files: Vec<CacheEntry> = self.current.values().cloned().collect();
        let dropped = if self.prune_stale {
            stale.len()
        } else {
            files.extend(stale.into_iter().cloned());
            files.sort_by(|a, b| a.metadata.path.cmp(&b.metadata.path));
            0
        };

        let file = CacheFile {
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
            files,
        };
        let json = serde_json::to_vec(&file)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| IndexerError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| IndexerError::io(&self.path, e))?;

        if dropped > 0 {
            info!("Pruned {} stale cache entries", dropped);
        }
        debug!("Wrote {} cache entries to {}", file.files.len(), self.path.display());
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn record(path: &str) -> FileRecord {
        let mut rec = FileRecord::minimal(path, "python", 3);
        rec.imports = vec!["os".to_string()];
        rec
    }

    #[test]
    fn test_roundtrip_and_reuse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let meta = FileMetadata::new("app.py", 42, b"import os\n");

        let mut cache = ChangeCache::load(&path, &CacheConfig::default());
        assert_eq!(cache.loaded(), 0);
        assert!(cache.should_reanalyze(&meta));
        cache.record_result(meta.clone(), record("app.py"));
        cache.persist().unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json["timestamp"].is_string());
        assert_eq!(json["files"][0]["path"], "app.py");
        assert_eq!(json["files"][0]["metadata"]["size"], 10);

        let cache = ChangeCache::load(&path, &CacheConfig::default());
        assert_eq!(cache.loaded(), 1);
        assert!(!cache.should_reanalyze(&meta));
        assert_eq!(cache.reader().cached(&meta), Some(&record("app.py")));

        let edited = FileMetadata::new("app.py", 42, b"import sys\n");
        assert!(cache.should_reanalyze(&edited));
    }

    #[test]
    fn test_force_refresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let meta = FileMetadata::new("a.py", 1, b"x = 1\n");
        let mut cache = ChangeCache::load(&path, &CacheConfig::default());
        cache.record_result(meta.clone(), record("a.py"));
        cache.persist().unwrap();

        let config = CacheConfig {
            force_refresh: true,
            ..CacheConfig::default()
        };
        let cache = ChangeCache::load(&path, &config);
        assert_eq!(cache.loaded(), 1);
        assert!(cache.should_reanalyze(&meta));
    }

    #[test]
    fn test_malformed_cache_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ \"files\": [ not json").unwrap();

        let cache = ChangeCache::load(&path, &CacheConfig::default());
        assert_eq!(cache.loaded(), 0);
        assert!(cache.should_reanalyze(&FileMetadata::new("a.py", 1, b"")));
    }

    #[test]
    fn test_stale_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = ChangeCache::load(&path, &CacheConfig::default());
        cache.record_result(FileMetadata::new("gone.py", 1, b"a"), record("gone.py"));
        cache.record_result(FileMetadata::new("kept.py", 1, b"b"), record("kept.py"));
        cache.persist().unwrap();

        let keep_stale = CacheConfig {
            prune_stale: false,
            ..CacheConfig::default()
        };
        let mut cache = ChangeCache::load(&path, &keep_stale);
        cache.record_result(FileMetadata::new("kept.py", 1, b"b"), record("kept.py"));
        assert_eq!(cache.persist().unwrap(), 0);
        assert_eq!(ChangeCache::load(&path, &keep_stale).loaded(), 2);

        let mut cache = ChangeCache::load(&path, &CacheConfig::default());
        cache.record_result(FileMetadata::new("kept.py", 1, b"b"), record("kept.py"));
        assert_eq!(cache.persist().unwrap(), 1);
        assert_eq!(ChangeCache::load(&path, &CacheConfig::default()).loaded(), 1);
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("cache.json");
        let cache = ChangeCache::load(&path, &CacheConfig::default());
        assert!(matches!(cache.persist(), Err(IndexerError::Io { .. })));
    }

    proptest! {
        #[test]
        fn reanalyze_iff_triple_differs(
            mtime in 0i64..4,
            size_delta in 0usize..2,
            body in "[a-c]{1,3}",
            same_mtime in any::<bool>(),
            same_body in any::<bool>(),
        ) {
            let stored = FileMetadata::new("f.py", mtime, body.as_bytes());
            let current_body = if same_body { body.clone() } else { format!("{}{}", body, "x".repeat(size_delta)) };
            let current_mtime = if same_mtime { mtime } else { mtime + 1 };
            let current = FileMetadata::new("f.py", current_mtime, current_body.as_bytes());

            let reader = CacheReader {
                previous: Arc::new(HashMap::from([(
                    "f.py".to_string(),
                    CacheEntry { record: record("f.py"), metadata: stored.clone() },
                )])),
                force_refresh: false,
            };
            let same_triple = (stored.mtime, stored.size, &stored.checksum)
                == (current.mtime, current.size, &current.checksum);
            prop_assert_eq!(!reader.should_reanalyze(&current), same_triple);
        }
    }
}
