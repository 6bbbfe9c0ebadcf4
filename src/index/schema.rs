// Database schema introspection boundary

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Rows sampled per table.
const SAMPLE_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Key role, e.g. `PRI`.
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<String>,
    pub sample_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DbEngine {
    Mysql,
    Postgresql,
    Sqlite,
}

impl DbEngine {
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DbEngine::Mysql => Some(3306),
            DbEngine::Postgresql => Some(5432),
            DbEngine::Sqlite => None,
        }
    }
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DbEngine::Mysql => "MySQL",
            DbEngine::Postgresql => "PostgreSQL",
            DbEngine::Sqlite => "SQLite",
        })
    }
}

/// Connection options as given on the command line.
#[derive(Debug, Clone)]
pub struct DbOptions {
    pub engine: DbEngine,
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DbConfig {
    Sqlite {
        path: PathBuf,
    },
    Server {
        engine: DbEngine,
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

impl DbConfig {
    /// SQLite needs a file; server engines need a user and a database name.
    /// Anything less means no schema section.
    pub fn from_options(opts: &DbOptions) -> Option<Self> {
        match opts.engine {
            DbEngine::Sqlite => opts
                .path
                .clone()
                .or_else(|| opts.name.as_ref().map(PathBuf::from))
                .map(|path| DbConfig::Sqlite { path }),
            engine => {
                let user = opts.user.clone()?;
                let database = opts.name.clone()?;
                Some(DbConfig::Server {
                    engine,
                    host: opts.host.clone(),
                    port: opts.port.or(engine.default_port()).unwrap_or_default(),
                    user,
                    password: opts.password.clone().unwrap_or_default(),
                    database,
                })
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DbConfig::Sqlite { path } => format!("SQLite database {}", path.display()),
            DbConfig::Server {
                engine,
                host,
                port,
                database,
                ..
            } => format!("{} database {} on {}:{}", engine, database, host, port),
        }
    }
}

/// Lists the tables of the configured database. Never fails the run: an
/// unavailable driver or a connection failure yields an empty list.
pub fn introspect(config: &DbConfig) -> Vec<TableDescriptor> {
    match config {
        DbConfig::Sqlite { path } => match sqlite_tables(path) {
            Ok(tables) => {
                info!("Read schema of {} tables from {}", tables.len(), path.display());
                tables
            }
            Err(e) => {
                warn!("Database analysis failed for {}: {}", path.display(), e);
                Vec::new()
            }
        },
        DbConfig::Server { engine, .. } => {
            warn!("No {} driver in this build, skipping database schema", engine);
            Vec::new()
        }
    }
}

fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sqlite_tables(path: &Path) -> Result<Vec<TableDescriptor>> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        debug!("Introspecting table {}", name);
        let table = quoted(&name);

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |row| {
                let not_null: bool = row.get(3)?;
                let pk: i64 = row.get(5)?;
                Ok(ColumnDescriptor {
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    nullable: !not_null,
                    default: row.get(4)?,
                    key: (pk > 0).then(|| "PRI".to_string()),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", table))?;
        let foreign_keys = stmt
            .query_map([], |row| {
                Ok(ForeignKey {
                    column: row.get(3)?,
                    references_table: row.get(2)?,
                    references_column: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", table))?;
        let indexes = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|idx| !idx.starts_with("sqlite_"))
            .collect();

        let sample_rows = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM (SELECT 1 FROM {} LIMIT {})", table, SAMPLE_ROWS),
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .unwrap_or_else(|e| {
                warn!("Could not fetch sample data from {}: {}", name, e);
                0
            });

        tables.push(TableDescriptor {
            name,
            columns,
            foreign_keys,
            indexes,
            sample_rows,
        });
    }

    Ok(tables)
}
