//! SQLite-backed `Indexer`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rusqlite::{params, Transaction};
use tracing::debug;

use crate::error::Result;
use crate::index::analysis::Analyzer;
use crate::index::backend::Indexer;
use crate::index::models::{Tables, TermRow};
use crate::index::sqlite::IndexDatabase;
use crate::models::{IndexConfig, RecordType, ScoutKey, Searchable};

/// Writes analysed records into an `IndexDatabase`.
pub struct DatabaseIndexer {
    db: Arc<IndexDatabase>,
    analyzer: Analyzer,
    clean_words: bool,
}

impl DatabaseIndexer {
    pub fn new(db: Arc<IndexDatabase>, config: &IndexConfig) -> Self {
        Self {
            db,
            analyzer: Analyzer::for_kind(config.stemmer),
            clean_words: config.clean_words_table_on_every_update,
        }
    }

    /// Term rows for one record, sorted by term.
    pub fn term_rows<M: Searchable>(&self, model: &M) -> Vec<TermRow> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for value in model.to_searchable_array().values() {
            for term in self.analyzer.analyze(value) {
                *counts.entry(term).or_insert(0) += 1;
            }
        }

        counts
            .into_iter()
            .map(|(term, num_hits)| TermRow {
                length: term.chars().count() as u32,
                term,
                num_hits,
            })
            .collect()
    }
}

impl Indexer for DatabaseIndexer {
    fn index<M: Searchable>(&self, models: &[M]) -> Result<()> {
        if models.is_empty() {
            return Ok(());
        }

        let tables = self.db.tables();
        let rows: Vec<(String, ScoutKey, Vec<TermRow>)> = models
            .iter()
            .map(|m| (m.searchable_as().to_string(), m.scout_key(), self.term_rows(m)))
            .collect();

        let affected = self.db.with_transaction(|tx| {
            let mut affected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

            let insert_sql = format!(
                "INSERT INTO {} (document_type, document_id, term, length, num_hits)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                tables.index
            );

            for (doc_type, key, terms) in &rows {
                let old_terms = remove_document(tx, tables, doc_type, key)?;
                let entry = affected.entry(doc_type.clone()).or_default();
                entry.extend(old_terms);

                let mut stmt = tx.prepare_cached(&insert_sql)?;
                for row in terms {
                    stmt.execute(params![
                        doc_type,
                        key.as_str(),
                        row.term,
                        row.length as i64,
                        row.num_hits as i64,
                    ])?;
                    entry.insert(row.term.clone());
                }
            }

            for (doc_type, terms) in &affected {
                refresh_words(tx, tables, doc_type, terms, self.clean_words)?;
            }

            Ok(affected)
        })?;

        debug!(
            documents = models.len(),
            types = affected.len(),
            "indexed batch"
        );
        Ok(())
    }

    fn delete_from_index<M: Searchable>(&self, models: &[M]) -> Result<()> {
        if models.is_empty() {
            return Ok(());
        }

        let tables = self.db.tables();
        self.db.with_transaction(|tx| {
            let mut affected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for model in models {
                let doc_type = model.searchable_as().to_string();
                let old_terms = remove_document(tx, tables, &doc_type, &model.scout_key())?;
                affected.entry(doc_type).or_default().extend(old_terms);
            }

            for (doc_type, terms) in &affected {
                refresh_words(tx, tables, doc_type, terms, self.clean_words)?;
            }
            Ok(())
        })?;

        debug!(documents = models.len(), "removed batch from index");
        Ok(())
    }

    fn delete_entire_model_from_index<T: RecordType + ?Sized>(&self, model: &T) -> Result<()> {
        let doc_type = model.searchable_as();
        let tables = self.db.tables();

        let removed = self.db.with_transaction(|tx| {
            let removed = tx.execute(
                &format!("DELETE FROM {} WHERE document_type = ?1", tables.index),
                params![doc_type],
            )?;
            tx.execute(
                &format!("DELETE FROM {} WHERE document_type = ?1", tables.words),
                params![doc_type],
            )?;
            Ok(removed)
        })?;

        debug!(doc_type, rows = removed, "flushed record type");
        Ok(())
    }
}

/// Delete a document's rows, returning the terms it used to contain.
fn remove_document(
    tx: &Transaction<'_>,
    tables: &Tables,
    doc_type: &str,
    key: &ScoutKey,
) -> Result<Vec<String>> {
    let select_sql = format!(
        "SELECT term FROM {} WHERE document_type = ?1 AND document_id = ?2",
        tables.index
    );
    let terms = {
        let mut stmt = tx.prepare_cached(&select_sql)?;
        let rows = stmt.query_map(params![doc_type, key.as_str()], |row| row.get::<_, String>(0))?;
        let mut terms = Vec::new();
        for row in rows {
            terms.push(row?);
        }
        terms
    };

    if !terms.is_empty() {
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE document_type = ?1 AND document_id = ?2",
                tables.index
            ),
            params![doc_type, key.as_str()],
        )?;
    }

    Ok(terms)
}

/// Recompute `words` statistics for the given terms of one record type.
fn refresh_words(
    tx: &Transaction<'_>,
    tables: &Tables,
    doc_type: &str,
    terms: &BTreeSet<String>,
    clean_words: bool,
) -> Result<()> {
    let stats_sql = format!(
        "SELECT COALESCE(SUM(num_hits), 0), COUNT(*)
         FROM {}
         WHERE document_type = ?1 AND term = ?2",
        tables.index
    );
    let upsert_sql = format!(
        "INSERT INTO {} (document_type, term, num_hits, num_documents)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(document_type, term) DO UPDATE SET
             num_hits = excluded.num_hits,
             num_documents = excluded.num_documents",
        tables.words
    );
    let delete_sql = format!(
        "DELETE FROM {} WHERE document_type = ?1 AND term = ?2",
        tables.words
    );

    let mut stats = tx.prepare_cached(&stats_sql)?;
    for term in terms {
        let (num_hits, num_documents): (i64, i64) =
            stats.query_row(params![doc_type, term], |row| Ok((row.get(0)?, row.get(1)?)))?;

        if num_documents == 0 && clean_words {
            tx.execute(&delete_sql, params![doc_type, term])?;
        } else {
            tx.execute(&upsert_sql, params![doc_type, term, num_hits, num_documents])?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    fn setup(clean_words: bool) -> (Arc<IndexDatabase>, DatabaseIndexer) {
        let config = IndexConfig {
            clean_words_table_on_every_update: clean_words,
            ..IndexConfig::default()
        };
        let db = Arc::new(IndexDatabase::open_in_memory(&config).expect("db"));
        let indexer = DatabaseIndexer::new(db.clone(), &config);
        (db, indexer)
    }

    fn word_stats(db: &IndexDatabase, doc_type: &str, term: &str) -> Option<(i64, i64)> {
        use rusqlite::OptionalExtension;

        db.with_conn(|conn| {
            let sql = format!(
                "SELECT num_hits, num_documents FROM {} WHERE document_type = ?1 AND term = ?2",
                db.tables().words
            );
            Ok(conn
                .query_row(&sql, params![doc_type, term], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?)
        })
        .expect("word stats")
    }

    fn indexed_terms(db: &IndexDatabase, doc_type: &str, key: &str) -> Vec<String> {
        db.with_conn(|conn| {
            let sql = format!(
                "SELECT term FROM {} WHERE document_type = ?1 AND document_id = ?2 ORDER BY term",
                db.tables().index
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![doc_type, key], |row| row.get::<_, String>(0))?;
            let mut terms = Vec::new();
            for row in rows {
                terms.push(row?);
            }
            Ok(terms)
        })
        .expect("terms")
    }

    #[test]
    fn term_rows_count_occurrences_across_fields() {
        let (_db, indexer) = setup(true);
        let doc = Document::new("posts", 1)
            .with_field("title", "Rust search")
            .with_field("body", "search the rust index");

        let rows = indexer.term_rows(&doc);
        let search = rows.iter().find(|r| r.term == "search").expect("search term");
        assert_eq!(search.num_hits, 2);
        assert_eq!(search.length, 6);
        let rust = rows.iter().find(|r| r.term == "rust").expect("rust term");
        assert_eq!(rust.num_hits, 2);
    }

    #[test]
    fn index_writes_terms_and_word_statistics() {
        let (db, indexer) = setup(true);
        let docs = vec![
            Document::new("posts", 1).with_field("title", "apple banana"),
            Document::new("posts", 2).with_field("title", "apple apple"),
        ];

        indexer.index(&docs).expect("index");

        assert_eq!(indexed_terms(&db, "posts", "1"), vec!["appl", "banana"]);
        assert_eq!(word_stats(&db, "posts", "appl"), Some((3, 2)));
        assert_eq!(word_stats(&db, "posts", "banana"), Some((1, 1)));
    }

    #[test]
    fn reindexing_replaces_previous_terms() {
        let (db, indexer) = setup(true);
        indexer
            .index(&[Document::new("posts", 1).with_field("title", "banana")])
            .expect("first index");
        indexer
            .index(&[Document::new("posts", 1).with_field("title", "cherry")])
            .expect("second index");

        assert_eq!(indexed_terms(&db, "posts", "1"), vec!["cherri"]);
        assert_eq!(word_stats(&db, "posts", "banana"), None);
        assert_eq!(word_stats(&db, "posts", "cherri"), Some((1, 1)));
    }

    #[test]
    fn stale_words_are_kept_when_cleaning_is_disabled() {
        let (db, indexer) = setup(false);
        let doc = Document::new("posts", 1).with_field("title", "banana");
        indexer.index(std::slice::from_ref(&doc)).expect("index");
        indexer.delete_from_index(&[doc]).expect("delete");

        assert!(indexed_terms(&db, "posts", "1").is_empty());
        assert_eq!(word_stats(&db, "posts", "banana"), Some((0, 0)));
    }

    #[test]
    fn flush_only_touches_the_given_type() {
        let (db, indexer) = setup(true);
        indexer
            .index(&[
                Document::new("posts", 1).with_field("title", "banana"),
                Document::new("users", 1).with_field("name", "banana"),
            ])
            .expect("index");

        indexer
            .delete_entire_model_from_index("posts")
            .expect("flush");

        assert!(indexed_terms(&db, "posts", "1").is_empty());
        assert_eq!(indexed_terms(&db, "users", "1"), vec!["banana"]);
        assert_eq!(word_stats(&db, "posts", "banana"), None);
        assert_eq!(word_stats(&db, "users", "banana"), Some((1, 1)));
    }

    #[test]
    fn empty_batches_are_no_ops() {
        let (_db, indexer) = setup(true);
        let empty: Vec<Document> = Vec::new();
        indexer.index(&empty).expect("index");
        indexer.delete_from_index(&empty).expect("delete");
    }
}
