//! Read side of the engine.
//!
//! This module hosts the `Seeker` trait used by the engine adapter
//! and the SQLite-backed `DatabaseSeeker`.

mod seeker;

pub use seeker::{DatabaseSeeker, ScoredDocument, Seeker};
