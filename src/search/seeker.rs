//! Query execution against the SQLite index.
//!
//! Scores are computed per document as the sum over every matched
//! (query term, index term) pair of:
//!
//! ```text
//! idf_weight       * (1 + ln(N / num_documents))
//! + tf_weight      * num_hits
//! + deviation_weight * (query_term_len / index_term_len)
//! ```
//!
//! where `N` is the number of indexed documents of the searched type.
//! The deviation component rewards prefix matches that are close in
//! length to the query term.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Result, ScoutError};
use crate::index::analysis::Analyzer;
use crate::index::models::Tables;
use crate::index::IndexDatabase;
use crate::models::{Builder, IndexConfig, Page, ScoutKey, SearchResult, SearchSettings};

/// Collaborator that executes queries against the search index.
pub trait Seeker {
    /// Run `builder`, optionally restricted to one page of results.
    fn search(&self, builder: &Builder, page: Option<Page>) -> Result<SearchResult>;
}

/// A document together with its accumulated score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub key: ScoutKey,
    pub score: f64,
}

/// Reads ranked matches out of an `IndexDatabase`.
pub struct DatabaseSeeker {
    db: Arc<IndexDatabase>,
    analyzer: Analyzer,
    settings: SearchSettings,
}

impl DatabaseSeeker {
    pub fn new(db: Arc<IndexDatabase>, config: &IndexConfig, settings: SearchSettings) -> Self {
        Self {
            db,
            analyzer: Analyzer::for_kind(config.stemmer),
            settings,
        }
    }

    /// Query terms after analysis, de-duplicated in first-seen order.
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.analyzer
            .analyze(query)
            .into_iter()
            .filter(|term| seen.insert(term.clone()))
            .collect()
    }

    /// Every matching document of `doc_type`, best first.
    pub fn rank(&self, doc_type: &str, terms: &[String]) -> Result<Vec<ScoredDocument>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let tables = self.db.tables();
        self.db
            .with_conn(|conn| rank_documents(conn, tables, &self.settings, doc_type, terms))
    }
}

impl Seeker for DatabaseSeeker {
    fn search(&self, builder: &Builder, page: Option<Page>) -> Result<SearchResult> {
        if builder.model.trim().is_empty() {
            return Err(ScoutError::invalid_query("record type must not be empty"));
        }

        let terms = self.query_terms(&builder.query);
        if terms.is_empty() {
            debug!(model = %builder.model, "query has no searchable terms");
            return Ok(SearchResult::empty());
        }

        let ranked = self.rank(&builder.model, &terms)?;
        let hits = ranked.len() as u64;
        let identifiers = select_window(ranked, builder.limit, page);

        debug!(
            model = %builder.model,
            terms = terms.len(),
            hits,
            returned = identifiers.len(),
            "search completed"
        );

        Ok(SearchResult::new(identifiers, hits))
    }
}

#[derive(Default)]
struct Accumulator {
    score: f64,
    matched: HashSet<usize>,
}

fn rank_documents(
    conn: &Connection,
    tables: &Tables,
    settings: &SearchSettings,
    doc_type: &str,
    terms: &[String],
) -> Result<Vec<ScoredDocument>> {
    let total_documents: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(DISTINCT document_id) FROM {} WHERE document_type = ?1",
            tables.index
        ),
        params![doc_type],
        |row| row.get(0),
    )?;
    if total_documents == 0 {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT i.document_id, i.num_hits, i.length, w.num_documents
         FROM {index} i
         JOIN {words} w
           ON w.document_type = i.document_type AND w.term = i.term
         WHERE i.document_type = ?1
           AND (i.term = ?2 OR (?3 AND i.term LIKE ?4 ESCAPE '\\'))",
        index = tables.index,
        words = tables.words,
    );
    let mut stmt = conn.prepare(&sql)?;

    let mut scores: HashMap<String, Accumulator> = HashMap::new();
    for (position, term) in terms.iter().enumerate() {
        let wildcard = settings.wildcard_all_tokens
            || (settings.wildcard_last_token && position + 1 == terms.len());
        let pattern = format!("{}%", escape_like(term));
        let query_len = term.chars().count() as f64;

        let rows = stmt.query_map(params![doc_type, term, wildcard, pattern], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        for row in rows {
            let (document_id, num_hits, length, num_documents) = row?;
            let idf = 1.0 + (total_documents as f64 / num_documents.max(1) as f64).ln();
            let deviation = query_len / length.max(1) as f64;

            let entry = scores.entry(document_id).or_default();
            entry.score += settings.inverse_document_frequency_weight * idf
                + settings.term_frequency_weight * num_hits as f64
                + settings.term_deviation_weight * deviation;
            entry.matched.insert(position);
        }
    }

    let mut ranked: Vec<ScoredDocument> = scores
        .into_iter()
        .filter(|(_, acc)| {
            !settings.require_match_for_all_tokens || acc.matched.len() == terms.len()
        })
        .map(|(key, acc)| ScoredDocument {
            key: ScoutKey::from(key),
            score: acc.score,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    Ok(ranked)
}

/// Cut the ranked list down to the requested page or limit.
///
/// Pages are 1-based; page 0 is treated as the first page.
fn select_window(
    ranked: Vec<ScoredDocument>,
    limit: Option<usize>,
    page: Option<Page>,
) -> Vec<ScoutKey> {
    let keys = ranked.into_iter().map(|doc| doc.key);
    match page {
        Some(Page { page, per_page }) => {
            let offset = page.max(1).saturating_sub(1).saturating_mul(per_page);
            keys.skip(offset).take(per_page).collect()
        }
        None => keys.take(limit.unwrap_or(usize::MAX)).collect(),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
