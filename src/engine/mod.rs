//! Engine adapter.
//!
//! `Engine` is the capability set a host application programs
//! against. `DatabaseEngine` implements it by forwarding writes to an
//! `Indexer` and reads to a `Seeker`, then reshaping seeker output into
//! ordered record collections.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::index::{DatabaseIndexer, IndexDatabase, Indexer};
use crate::models::{
    Builder, IndexConfig, Page, RecordType, ScoutKey, SearchResult, SearchSettings, Searchable,
};
use crate::search::{DatabaseSeeker, Seeker};
use crate::source::RecordSource;

/// Operations a search engine exposes to its host.
pub trait Engine {
    /// Add or update the given records in the index.
    fn update<M: Searchable>(&self, models: &[M]) -> Result<()>;

    /// Remove the given records from the index.
    fn delete<M: Searchable>(&self, models: &[M]) -> Result<()>;

    /// Remove every record of the given type from the index.
    fn flush<T: RecordType + ?Sized>(&self, model: &T) -> Result<()>;

    /// Run a search without pagination.
    fn search(&self, builder: &Builder) -> Result<SearchResult>;

    /// Run a search and return only page `page` of size `per_page`.
    fn paginate(&self, builder: &Builder, per_page: usize, page: usize) -> Result<SearchResult>;

    /// Keys of the result, in rank order.
    fn map_ids(&self, result: &SearchResult) -> Vec<ScoutKey>;

    /// Hydrate the result into records, in rank order.
    fn map<M, R>(&self, builder: &Builder, result: &SearchResult, source: &R) -> Result<Vec<M>>
    where
        M: Searchable,
        R: RecordSource<M> + ?Sized;

    /// Total number of matches, independent of pagination.
    fn total_count(&self, result: &SearchResult) -> u64;
}

/// Engine that delegates to an indexer and a seeker.
pub struct DatabaseEngine<I, S> {
    indexer: I,
    seeker: S,
}

/// The engine as wired up against the bundled SQLite collaborators.
pub type SqliteEngine = DatabaseEngine<DatabaseIndexer, DatabaseSeeker>;

impl<I, S> DatabaseEngine<I, S> {
    pub fn new(indexer: I, seeker: S) -> Self {
        Self { indexer, seeker }
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    pub fn seeker(&self) -> &S {
        &self.seeker
    }
}

impl SqliteEngine {
    /// Open (or create) the index at `config.index_path` and wire both
    /// collaborators to it.
    pub fn open(config: &IndexConfig, settings: SearchSettings) -> Result<Self> {
        let db = Arc::new(IndexDatabase::open(config)?);
        Ok(Self::with_database(db, config, settings))
    }

    pub fn with_database(
        db: Arc<IndexDatabase>,
        config: &IndexConfig,
        settings: SearchSettings,
    ) -> Self {
        let indexer = DatabaseIndexer::new(db.clone(), config);
        let seeker = DatabaseSeeker::new(db, config, settings);
        Self::new(indexer, seeker)
    }
}

impl<I: Indexer, S: Seeker> Engine for DatabaseEngine<I, S> {
    fn update<M: Searchable>(&self, models: &[M]) -> Result<()> {
        self.indexer.index(models)
    }

    fn delete<M: Searchable>(&self, models: &[M]) -> Result<()> {
        self.indexer.delete_from_index(models)
    }

    fn flush<T: RecordType + ?Sized>(&self, model: &T) -> Result<()> {
        self.indexer.delete_entire_model_from_index(model)
    }

    fn search(&self, builder: &Builder) -> Result<SearchResult> {
        self.seeker.search(builder, None)
    }

    fn paginate(&self, builder: &Builder, per_page: usize, page: usize) -> Result<SearchResult> {
        self.seeker.search(builder, Some(Page { page, per_page }))
    }

    fn map_ids(&self, result: &SearchResult) -> Vec<ScoutKey> {
        result.identifiers().to_vec()
    }

    fn map<M, R>(&self, builder: &Builder, result: &SearchResult, source: &R) -> Result<Vec<M>>
    where
        M: Searchable,
        R: RecordSource<M> + ?Sized,
    {
        map_to_records(builder, result, source)
    }

    fn total_count(&self, result: &SearchResult) -> u64 {
        result.hits()
    }
}

/// Fetch the records behind `result` and order them by search rank.
///
/// Records the source returns for keys that are not part of the result
/// are dropped. A result without hits never reaches the source.
pub fn map_to_records<M, R>(builder: &Builder, result: &SearchResult, source: &R) -> Result<Vec<M>>
where
    M: Searchable,
    R: RecordSource<M> + ?Sized,
{
    if result.hits() == 0 {
        return Ok(Vec::new());
    }

    let ids = result.identifiers();
    // A key listed twice keeps its last position.
    let positions: HashMap<&ScoutKey, usize> =
        ids.iter().enumerate().map(|(pos, key)| (key, pos)).collect();

    let mut ranked: Vec<(usize, M)> = source
        .scout_models_by_ids(builder, ids)?
        .into_iter()
        .filter_map(|model| {
            let position = positions.get(&model.scout_key()).copied()?;
            Some((position, model))
        })
        .collect();

    ranked.sort_by_key(|(position, _)| *position);
    Ok(ranked.into_iter().map(|(_, model)| model).collect())
}
