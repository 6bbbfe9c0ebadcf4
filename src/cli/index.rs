// `index` command: scan a project and write its index

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::cli::summary::print_summary;
use crate::config::{Config, Overrides};
use crate::error::IndexerError;
use crate::index::schema::{DbConfig, DbEngine, DbOptions};
use crate::indexer::registry::Capability;
use crate::indexer::Indexer;

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Path to the codebase root directory
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Output file name
    #[arg(short, long, default_value = "codebase_index.json")]
    pub output: PathBuf,

    /// Additional pattern to ignore (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Additional library name to ignore, e.g. "my-custom-lib" (repeatable)
    #[arg(long = "ignore-library", value_name = "NAME")]
    pub ignore_library: Vec<String>,

    /// Print a summary to the console
    #[arg(long)]
    pub summary: bool,

    /// Re-analyze every file, ignoring the cache
    #[arg(long)]
    pub force_refresh: bool,

    /// Cache file name (default: .codebase_cache.json)
    #[arg(long, value_name = "FILE")]
    pub cache_file: Option<String>,

    /// Max file size in KB to analyze (default: 500)
    #[arg(long, value_name = "KB")]
    pub max_file_size: Option<u64>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Use the regex extractors only
    #[arg(long)]
    pub no_grammar: bool,

    /// Configuration file (defaults to .codebase-indexer.toml in the project)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database type
    #[arg(long, value_enum, default_value_t = DbEngine::Mysql)]
    pub db_type: DbEngine,

    /// Database host
    #[arg(long, default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long)]
    pub db_port: Option<u16>,

    /// Database username
    #[arg(long)]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long)]
    pub db_password: Option<String>,

    /// Database name
    #[arg(long)]
    pub db_name: Option<String>,

    /// SQLite database file path (SQLite only)
    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl IndexArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            ignore: self.ignore.clone(),
            ignore_library: self.ignore_library.clone(),
            max_file_size_kb: self.max_file_size,
            cache_file: self.cache_file.clone(),
            force_refresh: self.force_refresh,
            threads: self.threads,
        }
    }

    fn db_options(&self) -> DbOptions {
        DbOptions {
            engine: self.db_type,
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            name: self.db_name.clone(),
            path: self.db_path.clone(),
        }
    }
}

/// Loads and validates the configuration for a run.
pub fn resolve_config(args: &IndexArgs) -> std::result::Result<Config, IndexerError> {
    if !args.path.is_dir() {
        return Err(IndexerError::Config(format!(
            "path '{}' does not exist or is not a directory",
            args.path.display()
        )));
    }

    let mut config = Config::load(&args.path, args.config.as_deref())?;
    config.apply_overrides(&args.overrides());
    config
        .validate()
        .map_err(|e| IndexerError::Config(e.to_string()))?;
    Ok(config)
}

pub async fn index_project(args: IndexArgs, config: Config) -> Result<()> {
    println!("🚀 Analyzing codebase at: {}", args.path.display());
    if config.cache.force_refresh {
        println!("🔄 Force refresh enabled - ignoring cache");
    }

    let database = DbConfig::from_options(&args.db_options());
    if let Some(db) = &database {
        println!("🗄️  Will also analyze {}", db.describe());
    }

    let capability = Capability::detect(args.no_grammar);
    info!("Parsing method: {}", capability.describe());

    let mut indexer = Indexer::new(config, capability)?.with_progress(true);
    let report = indexer.run(&args.path, &args.output, database.as_ref()).await?;

    if args.summary {
        print_summary(&report, capability);
        println!();
    }

    let stats = &report.stats;
    let kb = |path: &std::path::Path| std::fs::metadata(path).map(|m| m.len() as f64 / 1024.0).unwrap_or(0.0);
    println!("📚 Codebase index saved to {}", report.output.display());
    println!(
        "📊 Analyzed {} files ({} lines): {} re-analyzed, {} from cache",
        report.summary.project_overview.total_files,
        report.summary.project_overview.total_loc,
        stats.analyzed,
        stats.cached
    );
    println!(
        "🚫 Skipped: {} by pattern, {} vendor, {} minified, {} oversized, {} unreadable",
        stats.skipped_pattern, stats.skipped_vendor, stats.skipped_minified, stats.skipped_oversized, stats.unreadable
    );
    if stats.degraded > 0 {
        println!("⚠️  {} files could only be partially analyzed", stats.degraded);
    }
    println!(
        "🎯 Index size: {:.1}KB, Cache size: {:.1}KB",
        kb(&report.output),
        if report.cache_written { kb(&report.cache) } else { 0.0 }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        index: IndexArgs,
    }

    fn parse(args: &[&str]) -> IndexArgs {
        TestCli::parse_from(std::iter::once("codebase-indexer").chain(args.iter().copied())).index
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.path, PathBuf::from("."));
        assert_eq!(args.output, PathBuf::from("codebase_index.json"));
        assert_eq!(args.db_type, DbEngine::Mysql);
        assert!(args.max_file_size.is_none());
        assert!(DbConfig::from_options(&args.db_options()).is_none());
    }

    #[test]
    fn test_flags_reach_config() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let args = parse(&[root, "--ignore", "fixtures", "--ignore", "gen", "--max-file-size", "64", "--threads", "3"]);
        let config = resolve_config(&args).unwrap();
        assert!(config.indexing.ignore_patterns.contains(&"fixtures".to_string()));
        assert!(config.indexing.ignore_patterns.contains(&"gen".to_string()));
        assert_eq!(config.indexing.max_file_size, 64 * 1024);
        assert_eq!(config.performance.threads, 3);
        assert_eq!(config.cache.file, ".codebase_cache.json");
    }

    #[test]
    fn test_project_file_survives_unset_flags() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::config::PROJECT_CONFIG_FILE),
            "[indexing]\nmax_file_size = 2048\n",
        )
        .unwrap();
        let args = parse(&[dir.path().to_str().unwrap()]);
        assert_eq!(resolve_config(&args).unwrap().indexing.max_file_size, 2048);
    }

    #[test]
    fn test_missing_root_is_usage_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let args = parse(&[missing.to_str().unwrap()]);
        assert_eq!(resolve_config(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn test_sqlite_flags() {
        let args = parse(&["--db-type", "sqlite", "--db-path", "app.db"]);
        assert_eq!(
            DbConfig::from_options(&args.db_options()),
            Some(DbConfig::Sqlite {
                path: PathBuf::from("app.db")
            })
        );
    }
}
