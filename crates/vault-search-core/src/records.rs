//! Record normalization and eligibility rules.
//!
//! Turns coerced [`SourceRecord`]s into [`IndexDocument`]s:
//!
//! 1. Each record is paired with its position in the source.
//! 2. Empty list entries are dropped from `tags` and `authors`.
//! 3. Ineligible records are removed (see [`is_eligible`]).
//! 4. `category` is derived from the directory part of `file_path`.
//!
//! Ids are assigned from the pre-filter position, so the surviving
//! documents keep the ordinal of their source row.

use crate::models::{IndexDocument, SourceRecord};

/// Separator placed between path segments in a derived category.
pub const CATEGORY_SEPARATOR: &str = " > ";

/// Options controlling which optional fields are carried into documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionOptions {
    /// Keep the summarized content excerpt (`spr_content`).
    pub store_summary: bool,
    /// Keep the full markdown body (`md_content`).
    pub store_content: bool,
}

/// Derive a category from a slash-separated file path.
///
/// Drops the final segment and joins the rest with [`CATEGORY_SEPARATOR`].
/// Top-level files yield an empty string.
///
/// ```rust
/// use vault_search_core::records::extract_category;
///
/// assert_eq!(extract_category("playbook/ops/runbook.md"), "playbook > ops");
/// assert_eq!(extract_category("readme.md"), "");
/// ```
pub fn extract_category(file_path: &str) -> String {
    if file_path.is_empty() {
        return String::new();
    }
    let mut parts: Vec<&str> = file_path.split('/').collect();
    parts.pop();
    parts.join(CATEGORY_SEPARATOR)
}

/// Whether a record may appear in the search index.
///
/// A record is excluded when it is explicitly a draft, explicitly marked
/// `hiring = false`, has a status other than `""`/`"Open"`, or lacks a
/// title or description. Unset booleans never exclude.
pub fn is_eligible(record: &SourceRecord) -> bool {
    let draft = record.draft == Some(true);
    let hiring_excluded = record.hiring == Some(false);
    let closed = !record.status.is_empty() && record.status != "Open";

    !(draft || hiring_excluded || closed)
        && !record.title.is_empty()
        && !record.description.is_empty()
}

/// Drop empty entries from a list field, preserving order.
pub fn clean_list(values: &[String]) -> Vec<String> {
    values.iter().filter(|v| !v.is_empty()).cloned().collect()
}

/// Build the document for a record at source position `ordinal`.
pub fn to_document(ordinal: usize, record: &SourceRecord, opts: ProjectionOptions) -> IndexDocument {
    IndexDocument {
        id: ordinal.to_string(),
        file_path: record.file_path.clone(),
        title: record.title.clone(),
        description: record.description.clone(),
        tags: clean_list(&record.tags),
        authors: clean_list(&record.authors),
        date: record.date.clone(),
        category: extract_category(&record.file_path),
        spr_content: opts
            .store_summary
            .then(|| record.spr_content.replace('\n', "<hr />")),
        md_content: opts.store_content.then(|| record.md_content.clone()),
    }
}

/// Project eligible records into documents, in source order.
pub fn project_documents(records: &[SourceRecord], opts: ProjectionOptions) -> Vec<IndexDocument> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| is_eligible(record))
        .map(|(ordinal, record)| to_document(ordinal, record, opts))
        .collect()
}
