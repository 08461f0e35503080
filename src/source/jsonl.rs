//! JSON Lines record source.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, ScoutError};
use crate::models::{Builder, Document, ScoutKey};
use crate::source::RecordSource;

/// Read one `Document` per non-blank line.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut documents = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line).map_err(|err| {
            ScoutError::config(format!(
                "{}:{}: invalid document: {err}",
                path.display(),
                idx + 1
            ))
        })?;
        documents.push(document);
    }

    Ok(documents)
}

/// In-memory set of documents loaded from a JSON Lines file.
///
/// Lookups return documents in file order, not in the order the keys
/// were requested.
#[derive(Debug, Clone, Default)]
pub struct JsonlSource {
    documents: Vec<Document>,
}

impl JsonlSource {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_documents(read_documents(path)?))
    }

    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

impl RecordSource<Document> for JsonlSource {
    fn scout_models_by_ids(&self, builder: &Builder, ids: &[ScoutKey]) -> Result<Vec<Document>> {
        let wanted: HashSet<&ScoutKey> = ids.iter().collect();

        Ok(self
            .documents
            .iter()
            .filter(|doc| doc.doc_type == builder.model)
            .filter(|doc| wanted.contains(&doc.id))
            .filter(|doc| {
                builder.wheres.iter().all(|clause| {
                    doc.field_text(&clause.field).as_deref() == Some(clause.value.as_str())
                })
            })
            .cloned()
            .collect())
    }
}
