//! Shared data models for records, query builders, and search results.
//!
//! These types form the stable JSON API surface used by the CLI
//! and the HTTP server.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Schema version for `SearchResponse` JSON payloads.
///
/// This version follows semver semantics (MAJOR.MINOR.PATCH):
/// - MAJOR: Breaking changes to required fields or field semantics.
/// - MINOR: Backward-compatible additions (new optional fields).
/// - PATCH: Documentation or internal changes only.
pub const SEARCH_RESULT_VERSION: &str = "1.0.0";

/// Unique key of a record within its record type.
///
/// Integer and string keys are both accepted on input and normalised
/// to their string form, which is also what the index stores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScoutKey(String);

impl ScoutKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScoutKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ScoutKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for ScoutKey {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for ScoutKey {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<i32> for ScoutKey {
    fn from(value: i32) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for ScoutKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ScoutKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawKey {
            Int(i64),
            Uint(u64),
            Str(String),
        }

        Ok(match RawKey::deserialize(deserializer)? {
            RawKey::Int(v) => ScoutKey::from(v),
            RawKey::Uint(v) => ScoutKey::from(v),
            RawKey::Str(v) => ScoutKey::from(v),
        })
    }
}

/// A record that can be stored in the search index.
pub trait Searchable {
    /// Stable key identifying this record within its type.
    fn scout_key(&self) -> ScoutKey;

    /// Name of the record type, used to partition the index.
    fn searchable_as(&self) -> &str;

    /// Field name to text projection that the indexer analyses.
    fn to_searchable_array(&self) -> BTreeMap<String, String>;
}

/// Anything that names a record type; used when flushing a whole type.
pub trait RecordType {
    fn searchable_as(&self) -> &str;
}

impl RecordType for str {
    fn searchable_as(&self) -> &str {
        self
    }
}

impl RecordType for String {
    fn searchable_as(&self) -> &str {
        self.as_str()
    }
}

/// Field equality constraint carried by a `Builder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub value: String,
}

/// Caller-supplied query: record type, text and constraints.
///
/// The seeker reads `model`, `query`, and `limit`; the `wheres`
/// constraints are honoured by whatever `RecordSource` hydrates the
/// matched keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Builder {
    /// Record type to search in.
    pub model: String,
    /// Free-text query.
    pub query: String,
    /// Field equality constraints applied when fetching records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wheres: Vec<WhereClause>,
    /// Maximum number of identifiers for unpaginated searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Builder {
    pub fn new(model: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            query: query.into(),
            wheres: Vec::new(),
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.wheres.push(WhereClause {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn take(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// 1-based page selection for paginated searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: usize,
    pub per_page: usize,
}

/// Raw result produced by a seeker.
///
/// `identifiers` are in rank order. `hits` counts every matching
/// record and may exceed `identifiers.len()` when the result was
/// limited or paginated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    identifiers: Vec<ScoutKey>,
    hits: u64,
}

impl SearchResult {
    pub fn new(identifiers: Vec<ScoutKey>, hits: u64) -> Self {
        Self { identifiers, hits }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn identifiers(&self) -> &[ScoutKey] {
        &self.identifiers
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

/// Generic JSON record used by the CLI, the server, and `JsonlSource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Record type this document belongs to.
    ///
    /// May be omitted in import files when the type is supplied
    /// separately (e.g. `scoutdb import --type posts`).
    #[serde(rename = "type", default)]
    pub doc_type: String,
    /// Unique key within `doc_type`.
    pub id: ScoutKey,
    /// Arbitrary JSON fields. Scalars are indexed by their text form;
    /// arrays and objects contribute their scalar leaves.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(doc_type: impl Into<String>, id: impl Into<ScoutKey>) -> Self {
        Self {
            doc_type: doc_type.into(),
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Text form of a top-level field, used for `where` comparisons.
    pub fn field_text(&self, name: &str) -> Option<String> {
        let value = self.fields.get(name)?;
        let mut parts = Vec::new();
        collect_scalars(value, &mut parts);
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl Searchable for Document {
    fn scout_key(&self) -> ScoutKey {
        self.id.clone()
    }

    fn searchable_as(&self) -> &str {
        &self.doc_type
    }

    fn to_searchable_array(&self) -> BTreeMap<String, String> {
        self.fields
            .keys()
            .filter_map(|name| self.field_text(name).map(|text| (name.clone(), text)))
            .collect()
    }
}

impl RecordType for Document {
    fn searchable_as(&self) -> &str {
        &self.doc_type
    }
}

fn collect_scalars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push(s.clone()),
        Value::Bool(_) | Value::Number(_) => out.push(value.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_scalars(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_scalars(item, out)),
    }
}

/// Request body for `POST /v1/import`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub documents: Vec<Document>,
}

/// Request body for `POST /v1/delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub ids: Vec<ScoutKey>,
}

/// Request body for `POST /v1/flush`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushRequest {
    #[serde(rename = "type")]
    pub doc_type: String,
}

/// Request body for `POST /v1/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub builder: Builder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
}

/// Top-level search payload returned by the CLI and the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Schema version for this payload.
    pub version: String,
    /// Record type that was searched.
    pub model: String,
    /// The query string as submitted.
    pub query: String,
    /// Matching keys in rank order.
    pub ids: Vec<ScoutKey>,
    /// Total number of matching records, independent of paging.
    pub total: u64,
    /// Hydrated records in rank order. `None` when no record source was
    /// given; an empty list when every match was filtered out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
}

/// Outcome of an import, delete, or flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSummary {
    pub operation: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    pub documents: u64,
}

/// Document count for a single record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub documents: u64,
    pub terms: u64,
}

/// Stemming algorithm applied after tokenization.
///
/// JSON and TOML use lowercase names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    None,
    #[default]
    English,
    German,
    French,
    Spanish,
    Italian,
    Dutch,
    Portuguese,
    Swedish,
    Russian,
}

impl StemmerKind {
    /// Lowercase name, as used in config files and index metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            StemmerKind::None => "none",
            StemmerKind::English => "english",
            StemmerKind::German => "german",
            StemmerKind::French => "french",
            StemmerKind::Spanish => "spanish",
            StemmerKind::Italian => "italian",
            StemmerKind::Dutch => "dutch",
            StemmerKind::Portuguese => "portuguese",
            StemmerKind::Swedish => "swedish",
            StemmerKind::Russian => "russian",
        }
    }

    pub(crate) fn algorithm(self) -> Option<rust_stemmers::Algorithm> {
        use rust_stemmers::Algorithm;

        match self {
            StemmerKind::None => None,
            StemmerKind::English => Some(Algorithm::English),
            StemmerKind::German => Some(Algorithm::German),
            StemmerKind::French => Some(Algorithm::French),
            StemmerKind::Spanish => Some(Algorithm::Spanish),
            StemmerKind::Italian => Some(Algorithm::Italian),
            StemmerKind::Dutch => Some(Algorithm::Dutch),
            StemmerKind::Portuguese => Some(Algorithm::Portuguese),
            StemmerKind::Swedish => Some(Algorithm::Swedish),
            StemmerKind::Russian => Some(Algorithm::Russian),
        }
    }
}

/// Default location of the SQLite index, relative to the working directory.
pub const DEFAULT_INDEX_PATH: &str = ".scoutdb/index.sqlite";

/// Default prefix for index tables.
pub const DEFAULT_TABLE_PREFIX: &str = "scout_";

fn default_index_path() -> PathBuf {
    PathBuf::from(DEFAULT_INDEX_PATH)
}

fn default_table_prefix() -> String {
    DEFAULT_TABLE_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

/// Configuration for opening and writing the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// SQLite database file.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    /// Prefix for the `meta`, `index`, and `words` tables.
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    /// Drop word statistics that no longer occur in any document.
    #[serde(default = "default_true")]
    pub clean_words_table_on_every_update: bool,
    /// Stemmer used by both indexing and searching.
    #[serde(default)]
    pub stemmer: StemmerKind,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            table_prefix: default_table_prefix(),
            clean_words_table_on_every_update: true,
            stemmer: StemmerKind::default(),
        }
    }
}

/// Ranking and matching knobs for the seeker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_weight")]
    pub inverse_document_frequency_weight: f64,
    #[serde(default = "default_weight")]
    pub term_frequency_weight: f64,
    #[serde(default = "default_weight")]
    pub term_deviation_weight: f64,
    /// Treat the final query term as a prefix.
    #[serde(default = "default_true")]
    pub wildcard_last_token: bool,
    /// Treat every query term as a prefix.
    #[serde(default)]
    pub wildcard_all_tokens: bool,
    /// Only return documents that match every query term.
    #[serde(default)]
    pub require_match_for_all_tokens: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            inverse_document_frequency_weight: 1.0,
            term_frequency_weight: 1.0,
            term_deviation_weight: 1.0,
            wildcard_last_token: true,
            wildcard_all_tokens: false,
            require_match_for_all_tokens: false,
        }
    }
}

/// Summary information about an on-disk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Location of the index on disk.
    pub index_path: PathBuf,
    /// Logical schema version for the index.
    pub schema_version: String,
    /// Version of the scoutdb tool that wrote the index.
    pub tool_version: String,
    /// Stemmer the index was built with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stemmer: Option<String>,
    /// ISO-8601 creation timestamp for this index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// ISO-8601 last-updated timestamp for this index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Number of indexed documents across all types.
    pub documents_indexed: u64,
    /// Per-type breakdown.
    #[serde(default)]
    pub types: Vec<TypeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scout_key_accepts_integers_and_strings() {
        let keys: Vec<ScoutKey> = serde_json::from_value(json!([5, "abc", -3])).expect("keys");
        assert_eq!(
            keys,
            vec![ScoutKey::from(5), ScoutKey::from("abc"), ScoutKey::from(-3)]
        );
        assert_eq!(serde_json::to_value(&keys[0]).expect("json"), json!("5"));
    }

    #[test]
    fn document_flattens_fields_for_indexing() {
        let doc: Document = serde_json::from_value(json!({
            "type": "posts",
            "id": 7,
            "fields": {
                "title": "Hello world",
                "views": 42,
                "draft": null,
                "tags": ["rust", "search"],
                "author": { "name": "Ada" }
            }
        }))
        .expect("document");

        let array = doc.to_searchable_array();
        assert_eq!(array.get("title").map(String::as_str), Some("Hello world"));
        assert_eq!(array.get("views").map(String::as_str), Some("42"));
        assert_eq!(array.get("tags").map(String::as_str), Some("rust search"));
        assert_eq!(array.get("author").map(String::as_str), Some("Ada"));
        assert!(!array.contains_key("draft"));
        assert_eq!(doc.scout_key(), ScoutKey::from("7"));
        assert_eq!(Searchable::searchable_as(&doc), "posts");
    }

    #[test]
    fn builder_chains_constraints() {
        let builder = Builder::new("posts", "rust").where_eq("status", "published").take(5);
        assert_eq!(builder.wheres.len(), 1);
        assert_eq!(builder.wheres[0].field, "status");
        assert_eq!(builder.limit, Some(5));
    }
}
