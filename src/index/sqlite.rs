//! SQLite storage for the search index.
//!
//! The database holds three tables, all named with the configured
//! prefix (default `scout_`):
//!
//! - `meta(key TEXT PRIMARY KEY, value TEXT NOT NULL)`
//! - `index(id INTEGER PRIMARY KEY, document_type TEXT, document_id TEXT,
//!          term TEXT, length INTEGER, num_hits INTEGER)`
//! - `words(id INTEGER PRIMARY KEY, document_type TEXT, term TEXT,
//!          num_hits INTEGER, num_documents INTEGER)`
//!
//! `index` has one row per term occurring in a document; `words`
//! aggregates those rows per record type and term. The connection is
//! configured with:
//!
//! - `journal_mode = WAL` for concurrent readers and a single writer.
//! - `synchronous = NORMAL` as a balance between safety and speed.
//! - `busy_timeout` to avoid transient `database is locked` errors.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, Transaction};
use tracing::debug;

use crate::error::{Result, ScoutError};
use crate::index::models::{IndexMeta, Tables, SCHEMA_VERSION};
use crate::models::{IndexConfig, StemmerKind, TypeSummary};

/// Shared handle to the index database.
///
/// The indexer and the seeker hold the same handle; the connection is
/// serialised behind a mutex so the handle is `Send + Sync`.
pub struct IndexDatabase {
    path: PathBuf,
    tables: Tables,
    conn: Mutex<Connection>,
}

impl IndexDatabase {
    /// Open (or create) the index described by `config`.
    ///
    /// Fails when the index was built with a different stemmer than
    /// `config.stemmer`, since the stored terms would never match the
    /// analysed queries.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        let db = Self::open_unchecked(config)?;
        db.ensure_stemmer(config.stemmer)?;
        Ok(db)
    }

    /// Open an index that must already exist on disk.
    pub fn open_existing(config: &IndexConfig) -> Result<Self> {
        if !config.index_path.is_file() {
            return Err(ScoutError::IndexNotFound(config.index_path.clone()));
        }
        Self::open(config)
    }

    /// Open an existing index for inspection only, whatever stemmer it
    /// was built with.
    pub fn inspect(config: &IndexConfig) -> Result<Self> {
        if !config.index_path.is_file() {
            return Err(ScoutError::IndexNotFound(config.index_path.clone()));
        }
        Self::open_unchecked(config)
    }

    /// Open a throwaway in-memory index.
    pub fn open_in_memory(config: &IndexConfig) -> Result<Self> {
        validate_prefix(&config.table_prefix)?;
        let conn = Connection::open_in_memory()?;
        Self::from_connection(PathBuf::from(":memory:"), config, conn)
    }

    fn open_unchecked(config: &IndexConfig) -> Result<Self> {
        validate_prefix(&config.table_prefix)?;

        let index_path = config.index_path.as_path();
        if let Some(parent) = index_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(index_path, flags)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_millis(5000))?;

        Self::from_connection(index_path.to_path_buf(), config, conn)
    }

    fn from_connection(path: PathBuf, config: &IndexConfig, conn: Connection) -> Result<Self> {
        let tables = Tables::with_prefix(&config.table_prefix);
        initialize_schema(&conn, &tables)?;
        initialize_meta(&conn, &tables, config.stemmer)?;

        debug!(
            path = %path.display(),
            prefix = %config.table_prefix,
            "opened index database"
        );

        Ok(Self {
            path,
            tables,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| ScoutError::Poisoned)?;
        f(&conn)
    }

    /// Run `f` inside a write transaction; commits only when `f` succeeds.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|_| ScoutError::Poisoned)?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        touch_meta(&tx, &self.tables)?;
        tx.commit()?;
        Ok(value)
    }

    fn ensure_stemmer(&self, configured: StemmerKind) -> Result<()> {
        let meta = self.load_meta()?;
        match meta.stemmer.as_deref() {
            Some(stored) if stored != configured.as_str() => Err(ScoutError::config(format!(
                "index at {} was built with the {stored:?} stemmer but {:?} is configured; \
                 rebuild the index or change the stemmer back",
                self.path.display(),
                configured.as_str()
            ))),
            _ => Ok(()),
        }
    }

    pub fn load_meta(&self) -> Result<IndexMeta> {
        self.with_conn(|conn| {
            let sql = format!("SELECT key, value FROM {}", self.tables.meta);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut map = HashMap::new();
            for row in rows {
                let (key, value) = row?;
                map.insert(key, value);
            }

            let schema_version = map
                .get("schema_version")
                .cloned()
                .unwrap_or_else(|| SCHEMA_VERSION.to_string());
            if schema_version != SCHEMA_VERSION {
                return Err(ScoutError::UnsupportedSchema(schema_version));
            }

            let created_at = map
                .get("created_at")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            let updated_at = map
                .get("updated_at")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(created_at);

            Ok(IndexMeta {
                schema_version,
                tool_version: map
                    .get("tool_version")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                stemmer: map.get("stemmer").cloned(),
                created_at,
                updated_at,
            })
        })
    }

    /// Distinct document and term counts per record type.
    pub fn type_summaries(&self) -> Result<Vec<TypeSummary>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT document_type, COUNT(DISTINCT document_id), COUNT(DISTINCT term)
                 FROM {}
                 GROUP BY document_type
                 ORDER BY document_type ASC",
                self.tables.index
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                Ok(TypeSummary {
                    doc_type: row.get(0)?,
                    documents: row.get::<_, i64>(1)? as u64,
                    terms: row.get::<_, i64>(2)? as u64,
                })
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                summaries.push(row?);
            }
            Ok(summaries)
        })
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(ScoutError::config(format!(
            "table prefix may only contain ASCII letters, digits, and '_'; got {prefix:?}"
        )))
    }
}

fn initialize_schema(conn: &Connection, tables: &Tables) -> Result<()> {
    let Tables { meta, index, words } = tables;
    // Index names cannot be quoted the same way, so derive them from the
    // unquoted table names.
    let index_bare = index.trim_matches('"');
    let words_bare = words.trim_matches('"');

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {meta} (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {index} (
            id            INTEGER PRIMARY KEY,
            document_type TEXT NOT NULL,
            document_id   TEXT NOT NULL,
            term          TEXT NOT NULL,
            length        INTEGER NOT NULL,
            num_hits      INTEGER NOT NULL,
            UNIQUE(document_type, document_id, term)
        );

        CREATE INDEX IF NOT EXISTS "{index_bare}_type_term"
            ON {index}(document_type, term);

        CREATE TABLE IF NOT EXISTS {words} (
            id            INTEGER PRIMARY KEY,
            document_type TEXT NOT NULL,
            term          TEXT NOT NULL,
            num_hits      INTEGER NOT NULL,
            num_documents INTEGER NOT NULL,
            UNIQUE(document_type, term)
        );

        CREATE INDEX IF NOT EXISTS "{words_bare}_term"
            ON {words}(term);
    "#
    ))?;

    Ok(())
}

fn initialize_meta(conn: &Connection, tables: &Tables, stemmer: StemmerKind) -> Result<()> {
    let now = crate::index::current_epoch_seconds().to_string();
    let sql = format!(
        "INSERT OR IGNORE INTO {} (key, value) VALUES (?1, ?2)",
        tables.meta
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = [
        ("schema_version", SCHEMA_VERSION),
        ("tool_version", env!("CARGO_PKG_VERSION")),
        ("stemmer", stemmer.as_str()),
        ("created_at", now.as_str()),
        ("updated_at", now.as_str()),
    ];
    for (key, value) in rows {
        stmt.execute(params![key, value])?;
    }

    Ok(())
}

fn touch_meta(tx: &Transaction<'_>, tables: &Tables) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (key, value) VALUES ('updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        tables.meta
    );
    tx.execute(
        &sql,
        params![crate::index::current_epoch_seconds().to_string()],
    )?;
    Ok(())
}
