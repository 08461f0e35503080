use anyhow::Result;

use crate::models::{Document, IndexSummary, MutationSummary, SearchResponse};

/// Widest preview of a hydrated document shown in text output.
const MAX_PREVIEW_WIDTH: usize = 60;

/// Render a `SearchResponse` in human-readable text form.
///
/// The first line reports the total hit count. Each ranked key follows
/// on its own line as `rank. key`; when documents were hydrated, only the
/// surviving records are listed, each with a short preview of its fields.
pub fn print_search_text(response: &SearchResponse) -> Result<()> {
    for line in search_lines(response) {
        println!("{line}");
    }
    Ok(())
}

fn search_lines(response: &SearchResponse) -> Vec<String> {
    let mut lines = vec![hits_line(response)];

    match &response.documents {
        None => {
            for (rank, id) in response.ids.iter().enumerate() {
                lines.push(format!("{:>3}. {id}", rank + 1));
            }
        }
        Some(documents) if documents.is_empty() && !response.ids.is_empty() => {
            lines.push("  (no records matched the source constraints)".to_string());
        }
        Some(documents) => {
            for (rank, doc) in documents.iter().enumerate() {
                lines.push(format!("{:>3}. {}  {}", rank + 1, doc.id, preview(doc)));
            }
        }
    }

    lines
}

fn hits_line(response: &SearchResponse) -> String {
    let noun = if response.total == 1 { "hit" } else { "hits" };
    format!(
        "{} {noun} for {:?} in {}",
        response.total, response.query, response.model
    )
}

/// Render an `IndexSummary` in human-readable text form.
pub fn print_index_summary_text(summary: &IndexSummary) -> Result<()> {
    println!("index_path   : {}", summary.index_path.display());
    println!("schema       : {}", summary.schema_version);
    println!("tool_version : {}", summary.tool_version);
    if let Some(stemmer) = &summary.stemmer {
        println!("stemmer      : {stemmer}");
    }
    if let Some(created) = &summary.created_at {
        println!("created_at   : {created}");
    }
    if let Some(updated) = &summary.updated_at {
        println!("updated_at   : {updated}");
    }
    println!("documents    : {}", summary.documents_indexed);

    for ty in &summary.types {
        println!(
            "  {:<20} documents={} terms={}",
            truncate(&ty.doc_type, 20),
            ty.documents,
            ty.terms
        );
    }

    Ok(())
}

/// Render a `MutationSummary` as a single line.
pub fn print_mutation_text(summary: &MutationSummary) -> Result<()> {
    match &summary.doc_type {
        Some(doc_type) if summary.operation == "flush" => {
            println!("{}: {doc_type}", summary.operation);
        }
        Some(doc_type) => {
            println!(
                "{}: {} document(s) of {doc_type}",
                summary.operation, summary.documents
            );
        }
        None => println!("{}: {} document(s)", summary.operation, summary.documents),
    }

    Ok(())
}

fn preview(doc: &Document) -> String {
    let text = doc
        .fields
        .keys()
        .filter_map(|name| doc.field_text(name).map(|value| format!("{name}={value}")))
        .collect::<Vec<_>>()
        .join(" ");

    truncate(&text, MAX_PREVIEW_WIDTH)
}

fn truncate(s: &str, max_width: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_width {
        s.to_string()
    } else if max_width <= 1 {
        "…".to_string()
    } else {
        s.chars()
            .take(max_width.saturating_sub(1))
            .collect::<String>()
            + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoutKey, SEARCH_RESULT_VERSION};

    #[test]
    fn truncate_leaves_short_strings_unchanged() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn truncate_handles_unicode_characters() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("éééé", 3), "éé…");
    }

    #[test]
    fn preview_lists_fields_in_key_order() {
        let doc = Document::new("posts", 1)
            .with_field("title", "Hello")
            .with_field("body", "World");

        assert_eq!(preview(&doc), "body=World title=Hello");
    }

    fn response(ids: &[i64], documents: Option<Vec<Document>>) -> SearchResponse {
        SearchResponse {
            version: SEARCH_RESULT_VERSION.to_string(),
            model: "posts".to_string(),
            query: "rust".to_string(),
            ids: ids.iter().map(|&id| ScoutKey::from(id)).collect(),
            total: ids.len() as u64,
            documents,
        }
    }

    #[test]
    fn hits_line_uses_singular_for_one_hit() {
        assert_eq!(hits_line(&response(&[1], None)), "1 hit for \"rust\" in posts");
    }

    #[test]
    fn search_lines_list_keys_without_source() {
        let lines = search_lines(&response(&[2, 1], None));
        assert_eq!(lines[1..], ["  1. 2", "  2. 1"]);
    }

    #[test]
    fn search_lines_do_not_fall_back_to_keys_when_all_records_filtered() {
        let lines = search_lines(&response(&[2, 1, 4], Some(Vec::new())));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("no records matched"));
        assert!(!lines.iter().any(|line| line.contains("1. 2")));
    }

    #[test]
    fn search_lines_list_only_hydrated_records() {
        let doc = Document::new("posts", 1).with_field("title", "Rust");
        let lines = search_lines(&response(&[2, 1], Some(vec![doc])));
        assert_eq!(lines[1..], ["  1. 1  title=Rust"]);
    }
}
