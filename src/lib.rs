//! SQL-backed full-text search engine for application records.
//!
//! The [`engine::Engine`] trait is what a host application programs
//! against. [`engine::DatabaseEngine`] forwards writes to an
//! [`index::Indexer`] and reads to a [`search::Seeker`], then restores
//! search rank order when records are hydrated through a
//! [`source::RecordSource`]. The bundled collaborators keep the index
//! in a single SQLite file.

pub mod cli;
pub mod engine;
pub mod error;
pub mod index;
pub mod models;
pub mod search;
pub mod server;
pub mod source;

pub use engine::{DatabaseEngine, Engine, SqliteEngine};
pub use error::{Result, ScoutError};
pub use models::{Builder, Document, RecordType, ScoutKey, SearchResult, Searchable};
pub use source::RecordSource;
