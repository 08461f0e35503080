//! Persisted index model shared by the indexer and the seeker.

use serde::{Deserialize, Serialize};

/// Logical schema version written to new indexes.
pub const SCHEMA_VERSION: &str = "1";

/// Metadata for the entire index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Schema version for the index on disk.
    pub schema_version: String,
    /// Version of the scoutdb tool that wrote the index.
    pub tool_version: String,
    /// Stemmer the index was built with; absent in indexes written
    /// before it was recorded.
    pub stemmer: Option<String>,
    /// Unix timestamp (seconds since epoch) when the index was created.
    pub created_at: u64,
    /// Unix timestamp (seconds since epoch) when the index was last updated.
    pub updated_at: u64,
}

/// Fully quoted table names for a given prefix.
#[derive(Debug, Clone)]
pub struct Tables {
    pub meta: String,
    pub index: String,
    pub words: String,
}

impl Tables {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            meta: format!("\"{prefix}meta\""),
            index: format!("\"{prefix}index\""),
            words: format!("\"{prefix}words\""),
        }
    }
}

/// One analysed term of a document, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRow {
    pub term: String,
    /// Length of the term in characters.
    pub length: u32,
    /// Occurrences of the term in the document.
    pub num_hits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_quoted_with_prefix() {
        let tables = Tables::with_prefix("scout_");
        assert_eq!(tables.meta, "\"scout_meta\"");
        assert_eq!(tables.index, "\"scout_index\"");
        assert_eq!(tables.words, "\"scout_words\"");
    }

    #[test]
    fn empty_prefix_still_produces_valid_identifiers() {
        let tables = Tables::with_prefix("");
        assert_eq!(tables.index, "\"index\"");
    }
}
