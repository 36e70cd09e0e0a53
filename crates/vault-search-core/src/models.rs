//! Core data models used throughout vault-search.
//!
//! These types represent the rows read from the columnar vault and the
//! documents derived from them for the search index.

use serde::{Deserialize, Serialize};

/// One row from the columnar content store, after field coercion.
///
/// Scalar text fields are never null here: the reader substitutes `""`.
/// `draft` and `hiring` stay tri-state so that "explicitly false" can be
/// told apart from "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    pub file_path: String,
    pub title: String,
    pub description: String,
    pub md_content: String,
    pub spr_content: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub date: String,
    pub draft: Option<bool>,
    pub hiring: Option<bool>,
    pub status: String,
    pub embeddings: Vec<f32>,
}

/// A document derived from an eligible [`SourceRecord`].
///
/// `id` is the record's position in the source before filtering, so ids
/// are sparse whenever rows were excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub file_path: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub date: String,
    pub category: String,
    /// Summarized content excerpt with newlines rendered as `<hr />`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spr_content: Option<String>,
    /// Full markdown body, kept only when snippets are wanted.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub md_content: Option<String>,
}

/// Stored-field projection written next to the serialized index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub file_path: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub date: String,
    pub category: String,
}

impl From<&IndexDocument> for StoredDocument {
    fn from(doc: &IndexDocument) -> Self {
        Self {
            id: doc.id.clone(),
            file_path: doc.file_path.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            tags: doc.tags.clone(),
            authors: doc.authors.clone(),
            date: doc.date.clone(),
            category: doc.category.clone(),
        }
    }
}
