//! Indexer abstraction.
//!
//! The `Indexer` trait is what the engine adapter writes through. It
//! knows nothing about the storage behind it; `DatabaseIndexer` is the
//! SQLite implementation shipped with this crate.

use crate::error::Result;
use crate::models::{RecordType, Searchable};

/// Collaborator that mutates the search index.
pub trait Indexer {
    /// Add or replace every record of the batch in the index.
    fn index<M: Searchable>(&self, models: &[M]) -> Result<()>;

    /// Remove every record of the batch from the index.
    fn delete_from_index<M: Searchable>(&self, models: &[M]) -> Result<()>;

    /// Remove every indexed record of the given type.
    fn delete_entire_model_from_index<T: RecordType + ?Sized>(&self, model: &T) -> Result<()>;
}
