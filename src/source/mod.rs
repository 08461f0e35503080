//! Record hydration.
//!
//! The index only stores keys. Turning keys back into records is the
//! job of a `RecordSource`, which owns the actual data (a database
//! table, a file, a remote service) and applies the builder's model
//! constraints while fetching.

mod jsonl;

pub use jsonl::{read_documents, JsonlSource};

use crate::error::Result;
use crate::models::{Builder, ScoutKey, Searchable};

/// Bulk lookup of records by key.
///
/// Implementations may return records in any order and may return
/// records that were not asked for; the engine filters and re-orders
/// the output to match the search ranking.
pub trait RecordSource<M: Searchable> {
    fn scout_models_by_ids(&self, builder: &Builder, ids: &[ScoutKey]) -> Result<Vec<M>>;
}
