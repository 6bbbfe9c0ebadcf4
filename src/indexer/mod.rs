// Scan engine: classification, change detection, extraction and assembly

pub mod classify;
pub mod language;
pub mod parser;
pub mod registry;
pub mod resolver;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{IndexerError, Result};
use crate::index::cache::{CacheReader, ChangeCache, FileMetadata};
use crate::index::schema::{self, DbConfig, TableDescriptor};
use crate::index::summary::{IndexAssembler, Summary};
use crate::index::FileRecord;
use classify::{IgnoreReason, PathClassifier, SkipCategory, Verdict};
use language::Language;
use registry::{Capability, Extraction, ExtractorRegistry};
use resolver::DependencyResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Resolving,
    Assembling,
    Done,
    /// Only reachable when the output index cannot be written.
    Failed,
}

/// Per-run tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Files extracted in this run, degraded ones included.
    pub analyzed: usize,
    /// Files whose cached record was reused.
    pub cached: usize,
    pub skipped_pattern: usize,
    pub skipped_vendor: usize,
    pub skipped_minified: usize,
    pub skipped_oversized: usize,
    pub unreadable: usize,
    pub degraded: usize,
}

impl ScanStats {
    fn skip(&mut self, reason: &IgnoreReason) {
        match reason.category() {
            SkipCategory::Pattern => self.skipped_pattern += 1,
            SkipCategory::Vendor => self.skipped_vendor += 1,
            SkipCategory::Minified => self.skipped_minified += 1,
            SkipCategory::Oversized => self.skipped_oversized += 1,
        }
    }

    pub fn indexed(&self) -> usize {
        self.analyzed + self.cached
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub summary: Summary,
    pub records: Vec<FileRecord>,
    pub stats: ScanStats,
    pub output: PathBuf,
    pub cache: PathBuf,
    pub cache_written: bool,
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    rel: String,
    language: Language,
    size: u64,
    mtime: i64,
}

#[derive(Debug)]
enum FileOutcome {
    Ignored(IgnoreReason),
    Unreadable(String),
    Cached {
        metadata: FileMetadata,
        record: FileRecord,
    },
    Extracted {
        metadata: FileMetadata,
        extraction: Extraction,
    },
}

/// The indexing engine; one instance per run.
pub struct Indexer {
    config: Arc<Config>,
    classifier: Arc<PathClassifier>,
    registry: Arc<ExtractorRegistry>,
    state: RunState,
    progress: bool,
}

impl Indexer {
    pub fn new(config: Config, capability: Capability) -> Result<Self> {
        let classifier = PathClassifier::new(&config).map_err(|e| IndexerError::Config(format!("{:#}", e)))?;
        let registry = ExtractorRegistry::new(capability, config.limits.extraction.clone());

        Ok(Self {
            config: Arc::new(config),
            classifier: Arc::new(classifier),
            registry: Arc::new(registry),
            state: RunState::Idle,
            progress: false,
        })
    }

    /// Shows a progress bar on stderr when it is a terminal.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn capability(&self) -> Capability {
        self.registry.capability()
    }

    /// Indexes `root` and writes the index to `output`.
    pub async fn run(&mut self, root: &Path, output: &Path, database: Option<&DbConfig>) -> Result<RunReport> {
        let root = root.canonicalize().map_err(|e| IndexerError::io(root, e))?;
        self.state = RunState::Scanning;
        info!("Scanning {} ({})", root.display(), self.capability().describe());

        let cache_path = self.config.cache_path(&root);
        let mut cache = ChangeCache::load(&cache_path, &self.config.cache);
        let excluded: Vec<PathBuf> = [cache_path.as_path(), output]
            .iter()
            .filter_map(|p| p.canonicalize().ok())
            .collect();

        let mut stats = ScanStats::default();
        let candidates = self.discover(&root, &excluded, &mut stats);
        info!("Found {} candidate files ({} cache entries loaded)", candidates.len(), cache.loaded());

        let outcomes = self.process_all(candidates, cache.reader()).await;

        let mut records = Vec::with_capacity(outcomes.len());
        for (rel, outcome) in outcomes {
            match outcome {
                FileOutcome::Ignored(reason) => {
                    debug!("Ignoring {}: {}", rel, reason);
                    stats.skip(&reason);
                }
                FileOutcome::Unreadable(reason) => {
                    warn!("Skipping unreadable file {}: {}", rel, reason);
                    stats.unreadable += 1;
                }
                FileOutcome::Cached { metadata, record } => {
                    debug!("Reusing cached record for {}", rel);
                    stats.cached += 1;
                    records.push(cache.record_result(metadata, record).record.clone());
                }
                FileOutcome::Extracted { metadata, extraction } => {
                    stats.analyzed += 1;
                    if let Extraction::Degraded { reason, .. } = &extraction {
                        warn!("Degraded extraction for {}: {}", rel, reason);
                        stats.degraded += 1;
                    }
                    records.push(cache.record_result(metadata, extraction.into_record()).record.clone());
                }
            }
        }

        self.state = RunState::Resolving;
        let resolution = DependencyResolver::new(&records).resolve(&records);

        self.state = RunState::Assembling;
        let tables = match database {
            Some(db) => introspect(db.clone()).await,
            None => Vec::new(),
        };
        let summary = IndexAssembler::new(&self.config.limits.summary).assemble(
            &records,
            &resolution,
            database.map(|_| tables.as_slice()),
        );

        let cache_written = match cache.persist() {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not save cache: {}", e);
                false
            }
        };

        if let Err(e) = write_index(&summary, output) {
            self.state = RunState::Failed;
            error!("{}", e);
            return Err(e);
        }

        self.state = RunState::Done;
        info!(
            "Indexed {} files ({} analyzed, {} from cache)",
            stats.indexed(),
            stats.analyzed,
            stats.cached
        );

        Ok(RunReport {
            summary,
            records,
            stats,
            output: output.to_path_buf(),
            cache: cache_path,
            cache_written,
        })
    }

    /// Walks the tree and returns indexable files sorted by path.
    fn discover(&self, root: &Path, excluded: &[PathBuf], stats: &mut ScanStats) -> Vec<Candidate> {
        let relative = |path: &Path| -> String {
            path.strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/")
        };

        let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || !self.classifier.is_ignored_dir(&relative(entry.path()))
        });

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read directory entry: {}", e);
                    stats.unreadable += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || excluded.iter().any(|p| p == entry.path()) {
                continue;
            }
            let Some(language) = Language::detect(entry.path()) else {
                continue;
            };

            let rel = relative(entry.path());
            match entry.metadata() {
                Ok(meta) => candidates.push(Candidate {
                    path: entry.path().to_path_buf(),
                    rel,
                    language,
                    size: meta.len(),
                    mtime: FileMetadata::mtime_of(&meta),
                }),
                Err(e) => {
                    warn!("Cannot stat {}: {}", rel, e);
                    stats.unreadable += 1;
                }
            }
        }

        candidates.sort_by(|a, b| a.rel.cmp(&b.rel));
        candidates
    }

    /// Classifies and extracts files on a bounded blocking pool. Results come
    /// back in candidate order.
    async fn process_all(&self, candidates: Vec<Candidate>, reader: CacheReader) -> Vec<(String, FileOutcome)> {
        let progress = self.progress_bar(candidates.len() as u64);
        let threads = self.config.performance.threads.max(1);

        let outcomes = stream::iter(candidates)
            .map(|candidate| {
                let classifier = Arc::clone(&self.classifier);
                let registry = Arc::clone(&self.registry);
                let reader = reader.clone();
                let rel = candidate.rel.clone();
                let task = tokio::task::spawn_blocking(move || process(candidate, &classifier, &registry, &reader));
                async move {
                    let outcome = task
                        .await
                        .unwrap_or_else(|e| FileOutcome::Unreadable(format!("worker failed: {}", e)));
                    (rel, outcome)
                }
            })
            .buffered(threads)
            .inspect(|_| progress.inc(1))
            .collect::<Vec<_>>()
            .await;

        progress.finish_and_clear();
        outcomes
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.progress || !std::io::stderr().is_terminal() {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar().template("  {spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} files {msg}") {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

fn process(
    candidate: Candidate,
    classifier: &PathClassifier,
    registry: &ExtractorRegistry,
    reader: &CacheReader,
) -> FileOutcome {
    if let Verdict::Ignore(reason) = classifier.classify(&candidate.path, &candidate.rel, candidate.size) {
        return FileOutcome::Ignored(reason);
    }

    let bytes = match std::fs::read(&candidate.path) {
        Ok(bytes) => bytes,
        Err(e) => return FileOutcome::Unreadable(e.to_string()),
    };
    let metadata = FileMetadata::new(candidate.rel.as_str(), candidate.mtime, &bytes);

    if let Some(record) = reader.cached(&metadata) {
        return FileOutcome::Cached {
            record: record.clone(),
            metadata,
        };
    }

    let extraction = registry.extract(&candidate.rel, candidate.language, &bytes);
    FileOutcome::Extracted { metadata, extraction }
}

async fn introspect(db: DbConfig) -> Vec<TableDescriptor> {
    info!("Analyzing {}", db.describe());
    tokio::task::spawn_blocking(move || schema::introspect(&db))
        .await
        .unwrap_or_else(|e| {
            warn!("Database analysis failed: {}", e);
            Vec::new()
        })
}

fn write_index(summary: &Summary, output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(output, json).map_err(|source| IndexerError::OutputWrite {
        path: output.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    fn indexer(config: Config) -> Indexer {
        Indexer::new(config, Capability::detect(false)).unwrap()
    }

    async fn run(dir: &TempDir, config: Config) -> RunReport {
        let output = dir.path().join("codebase_index.json");
        let mut engine = indexer(config);
        let report = engine.run(dir.path(), &output, None).await.unwrap();
        assert_eq!(engine.state(), RunState::Done);
        report
    }

    fn paths(report: &RunReport) -> Vec<&str> {
        report.summary.files.iter().map(|f| f.path.as_str()).collect()
    }

    const APP: &str = "import helpers\n\ndef main():\n    def inner():\n        pass\n    return inner\n";

    #[tokio::test]
    async fn test_only_top_level_functions() {
        let dir = project(&[("app.py", APP)]);
        let report = run(&dir, Config::default()).await;
        let functions: Vec<&str> = report.records[0].functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(functions, vec!["main"]);
    }

    #[tokio::test]
    async fn test_oversized_file_is_skipped() {
        let dir = project(&[("small.py", "x = 1\n"), ("big.py", &"y = 2\n".repeat(100))]);
        let mut config = Config::default();
        config.indexing.max_file_size = 100;
        let report = run(&dir, config).await;
        assert_eq!(paths(&report), vec!["small.py"]);
        assert_eq!(report.stats.skipped_oversized, 1);
    }

    #[tokio::test]
    async fn test_import_resolves_to_tree_file() {
        let dir = project(&[("app.py", APP), ("pkg/helpers.py", "def help():\n    pass\n")]);
        let report = run(&dir, Config::default()).await;
        assert_eq!(report.summary.dependency_map["app.py"], vec!["pkg/helpers.py"]);
        assert!(report.summary.project_overview.external_dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_reuses_cache() {
        let dir = project(&[("app.py", APP), ("src/util.js", "export function add(a, b) { return a + b; }\n")]);
        let first = run(&dir, Config::default()).await;
        assert_eq!(first.stats.analyzed, 2);
        assert!(first.cache_written);

        let second = run(&dir, Config::default()).await;
        assert_eq!(second.stats.analyzed, 0);
        assert_eq!(second.stats.cached, 2);
        assert_eq!(second.summary.files, first.summary.files);
        assert_eq!(second.summary.dependency_map, first.summary.dependency_map);

        let mut forced = Config::default();
        forced.cache.force_refresh = true;
        assert_eq!(run(&dir, forced).await.stats.analyzed, 2);
    }

    #[tokio::test]
    async fn test_corrupt_cache_rescans_everything() {
        let dir = project(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n"), (".codebase_cache.json", "{ not json")]);
        let report = run(&dir, Config::default()).await;
        assert_eq!(report.stats.analyzed, 2);
        assert_eq!(report.stats.cached, 0);
        assert_eq!(report.stats.unreadable, 0);
    }

    #[tokio::test]
    async fn test_edited_file_is_reanalyzed() {
        let dir = project(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        run(&dir, Config::default()).await;
        std::fs::write(dir.path().join("b.py"), "y = 3\nz = 4\n").unwrap();

        let report = run(&dir, Config::default()).await;
        assert_eq!(report.stats.analyzed, 1);
        assert_eq!(report.stats.cached, 1);
        assert_eq!(report.records[1].variables, vec!["y", "z"]);
    }

    #[tokio::test]
    async fn test_skips_and_degraded_files() {
        let dir = project(&[
            ("node_modules/react/index.js", "module.exports = {};\n"),
            ("web/vendor.bundle.js", "var x = 1;\n"),
            ("notes.txt", "not indexed\n"),
            ("good.py", "ok = 1\n"),
        ]);
        std::fs::write(dir.path().join("broken.py"), [b'a', b'\n', 0xff, 0xfe]).unwrap();

        let report = run(&dir, Config::default()).await;
        assert_eq!(paths(&report), vec!["broken.py", "good.py"]);
        assert_eq!(report.stats.skipped_vendor, 1);
        assert_eq!(report.stats.degraded, 1);
        assert_eq!(report.records[0].loc, 2);
        assert!(report.records[0].variables.is_empty());
        assert_eq!(report.records[1].variables, vec!["ok"]);
        // Pruned directories are never visited, so they are not tallied.
        assert_eq!(report.stats.skipped_pattern, 0);
    }

    #[tokio::test]
    async fn test_output_and_cache_are_not_indexed() {
        let dir = project(&[("a.json", "{}\n")]);
        let first = run(&dir, Config::default()).await;
        let second = run(&dir, Config::default()).await;
        assert_eq!(paths(&first), vec!["a.json"]);
        assert_eq!(paths(&second), vec!["a.json"]);

        let written: Summary =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("codebase_index.json")).unwrap()).unwrap();
        assert_eq!(written.files, second.summary.files);
    }

    #[tokio::test]
    async fn test_output_failure_is_fatal() {
        let dir = project(&[("a.py", "x = 1\n")]);
        let output = dir.path().join("missing").join("index.json");
        let mut engine = indexer(Config::default());
        let err = engine.run(dir.path(), &output, None).await.unwrap_err();
        assert!(matches!(err, IndexerError::OutputWrite { .. }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(engine.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_unavailable_database_still_writes_index() {
        let dir = project(&[("a.py", "x = 1\n")]);
        let output = dir.path().join("codebase_index.json");
        let db = DbConfig::Sqlite {
            path: dir.path().join("absent.db"),
        };
        let report = indexer(Config::default()).run(dir.path(), &output, Some(&db)).await.unwrap();
        assert_eq!(report.summary.files.len(), 1);
        assert!(report.summary.database_schema.is_none());
    }
}
