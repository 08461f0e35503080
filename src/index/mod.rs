//! Index storage, text analysis, and the indexer side of the engine.
//!
//! The `Indexer` trait is the write seam used by the engine adapter.
//! `DatabaseIndexer` implements it on top of a SQLite `IndexDatabase`
//! that it shares with the seeker.

pub mod analysis;
mod backend;
mod indexer;
pub mod models;
mod sqlite;

pub use backend::Indexer;
pub use indexer::DatabaseIndexer;
pub use models::{IndexMeta, TermRow};
pub use sqlite::IndexDatabase;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::models::{IndexConfig, IndexSummary};

/// Read-only helper to inspect an existing index.
///
/// Fails with `ScoutError::IndexNotFound` when nothing exists at the
/// configured path; it never creates a new index. The configured
/// stemmer is not checked, so a mismatched index can still be inspected.
pub fn get_index_info(config: &IndexConfig) -> Result<IndexSummary> {
    let db = IndexDatabase::inspect(config)?;
    summarize(&db)
}

/// Summarise an already opened index.
pub fn summarize(db: &IndexDatabase) -> Result<IndexSummary> {
    let meta = db.load_meta()?;
    let types = db.type_summaries()?;
    let documents_indexed = types.iter().map(|t| t.documents).sum();

    Ok(IndexSummary {
        index_path: db.path().to_path_buf(),
        schema_version: meta.schema_version,
        tool_version: meta.tool_version,
        stemmer: meta.stemmer,
        created_at: format_timestamp_iso8601(meta.created_at),
        updated_at: format_timestamp_iso8601(meta.updated_at),
        documents_indexed,
        types,
    })
}

pub(crate) fn current_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_timestamp_iso8601(secs: u64) -> Option<String> {
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};

    let ts = secs as i64;
    let dt = OffsetDateTime::from_unix_timestamp(ts).ok()?;
    Some(dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn index_info_counts_documents_per_type() {
        let dir = tempdir().expect("tempdir");
        let config = IndexConfig {
            index_path: dir.path().join("index.sqlite"),
            ..IndexConfig::default()
        };

        let db = Arc::new(IndexDatabase::open(&config).expect("open"));
        DatabaseIndexer::new(db.clone(), &config)
            .index(&[
                Document::new("posts", 1).with_field("title", "hello world"),
                Document::new("posts", 2).with_field("title", "hello"),
                Document::new("users", 9).with_field("name", "ada"),
            ])
            .expect("index");
        drop(db);

        let info = get_index_info(&config).expect("info");
        assert_eq!(info.documents_indexed, 3);
        assert_eq!(info.types.len(), 2);
        assert_eq!(info.types[0].doc_type, "posts");
        assert_eq!(info.types[0].documents, 2);
        assert_eq!(info.types[0].terms, 2);
        assert!(info.created_at.is_some());
        assert!(info.updated_at.is_some());
    }

    #[test]
    fn index_info_fails_for_missing_index() {
        let dir = tempdir().expect("tempdir");
        let config = IndexConfig {
            index_path: dir.path().join("nope.sqlite"),
            ..IndexConfig::default()
        };

        let err = get_index_info(&config).expect_err("missing index");
        assert!(err.to_string().starts_with("index not found at "));
    }

    #[test]
    fn formats_epoch_as_rfc3339() {
        assert_eq!(
            format_timestamp_iso8601(0).as_deref(),
            Some("1970-01-01T00:00:00Z")
        );
    }
}
