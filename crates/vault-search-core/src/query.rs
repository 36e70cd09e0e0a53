//! Query parsing, filtering, snippets and grouping over a [`SearchIndex`].
//!
//! A raw query may carry inline filters next to its free text:
//!
//! | Token | Effect |
//! |-------|--------|
//! | `author:name`, `@name` | keep documents with a matching author |
//! | `tag:name`, `#name` | keep documents with a matching tag |
//! | `title:word` | keep documents whose title contains `word` |
//!
//! Filters match case-insensitively by substring. Remaining tokens form
//! the text query handed to the index.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::Value;

use crate::index::{SearchIndex, StoredFields};

/// Maximum length of a `matching_lines` excerpt before trimming.
const EXCERPT_CHARS: usize = 100;

/// Filters extracted from a raw query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub title: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty() && self.tags.is_empty() && self.title.is_none()
    }

    /// Whether a document's stored fields satisfy every filter.
    pub fn matches(&self, stored: &StoredFields) -> bool {
        if let Some(title) = &self.title {
            let doc_title = stored.get("title").and_then(Value::as_str).unwrap_or("");
            if !doc_title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if !self.authors.is_empty() && !any_entry_matches(stored.get("authors"), &self.authors) {
            return false;
        }
        if !self.tags.is_empty() && !any_entry_matches(stored.get("tags"), &self.tags) {
            return false;
        }
        true
    }
}

fn any_entry_matches(field: Option<&Value>, wanted: &[String]) -> bool {
    let entries: Vec<String> = field
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default();

    wanted.iter().any(|w| {
        let w = w.to_lowercase();
        entries.iter().any(|e| e.contains(&w))
    })
}

/// A query split into its text part and its filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub text: String,
    pub filters: QueryFilters,
}

/// Split filter tokens out of a raw query.
///
/// ```rust
/// use vault_search_core::query::parse_query;
///
/// let parsed = parse_query("rust tag:async @alice");
/// assert_eq!(parsed.text, "rust");
/// assert_eq!(parsed.filters.tags, vec!["async"]);
/// assert_eq!(parsed.filters.authors, vec!["alice"]);
/// ```
pub fn parse_query(raw: &str) -> ParsedQuery {
    let mut filters = QueryFilters::default();
    let mut kept = Vec::new();

    for token in raw.split(' ') {
        if let Some(rest) = token.strip_prefix("title:") {
            filters.title = Some(rest.to_string());
        } else if let Some(rest) = token.strip_prefix("author:") {
            filters.authors.push(rest.to_string());
        } else if let Some(names) = split_marked(token, '@') {
            filters.authors.extend(names);
        } else if let Some(rest) = token.strip_prefix("tag:") {
            filters.tags.push(rest.to_string());
        } else if let Some(names) = split_marked(token, '#') {
            filters.tags.extend(names);
        } else {
            kept.push(token);
        }
    }

    ParsedQuery {
        text: kept.join(" ").trim().to_string(),
        filters,
    }
}

/// Parse `#a#b` / `@a@b` style tokens into their names.
fn split_marked(token: &str, marker: char) -> Option<Vec<String>> {
    if !token.contains(marker) {
        return None;
    }
    let names: Vec<String> = token
        .split(marker)
        .skip(1)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    (!names.is_empty()).then_some(names)
}

fn markdown_patterns() -> &'static [(Regex, &'static str); 3] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Regex::new(r"!\[.*?\]\(.*?\)").expect("valid image pattern"), ""),
            (Regex::new(r"\[([^\]]+)\]\(.*?\)").expect("valid link pattern"), "$1"),
            (Regex::new(r"[*_~`#]").expect("valid emphasis pattern"), ""),
        ]
    })
}

/// Strip images, link targets and inline emphasis from markdown.
pub fn markdown_to_plain_text(markdown: &str) -> String {
    markdown_patterns()
        .iter()
        .fold(markdown.to_string(), |text, (re, replacement)| {
            re.replace_all(&text, *replacement).into_owned()
        })
}

/// First content line matching any query word, highlighted and trimmed.
///
/// Matches are wrapped in `<span>…</span>`. Excerpts longer than
/// [`EXCERPT_CHARS`] are cut at a space that does not split a highlight.
/// Returns an empty string when nothing matches.
pub fn matching_lines(content: &str, query: &str) -> String {
    if content.is_empty() || query.trim().is_empty() {
        return String::new();
    }

    let alternatives: Vec<String> = query
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    let Ok(re) = RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()
    else {
        return String::new();
    };

    let Some(line) = content.split('\n').find(|line| re.is_match(line)) else {
        return String::new();
    };

    let plain = markdown_to_plain_text(line);
    let highlighted = re.replace_all(&plain, "<span>$0</span>").into_owned();

    if highlighted.chars().count() <= EXCERPT_CHARS {
        return format!("...{}...", highlighted);
    }

    let cut = highlighted
        .char_indices()
        .nth(EXCERPT_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(highlighted.len());
    let trimmed = &highlighted[..cut];

    let mut end = trimmed.rfind(' ');
    while let Some(pos) = end {
        if pos == 0 {
            break;
        }
        let candidate = &trimmed[..pos];
        if candidate.matches("<span>").count() == candidate.matches("</span>").count() {
            break;
        }
        end = trimmed[..pos].rfind(' ');
    }

    format!("...{}...", &trimmed[..end.unwrap_or(0)])
}

/// A search hit enriched for display.
#[derive(Debug, Clone, Serialize)]
pub struct ResultDocument {
    pub id: String,
    pub score: f64,
    #[serde(skip)]
    pub category: String,
    pub matching_lines: String,
    #[serde(flatten)]
    pub stored: StoredFields,
}

/// Ranked results, flat and grouped by category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupedResults {
    pub grouped: BTreeMap<String, Vec<ResultDocument>>,
    pub flat: Vec<ResultDocument>,
}

/// Group results by category, preserving rank order within each group.
pub fn group_by_category(results: &[ResultDocument]) -> BTreeMap<String, Vec<ResultDocument>> {
    let mut grouped: BTreeMap<String, Vec<ResultDocument>> = BTreeMap::new();
    for result in results {
        grouped
            .entry(result.category.clone())
            .or_default()
            .push(result.clone());
    }
    grouped
}

/// Run a raw query (with inline filters) against the index.
///
/// Results are truncated to `limit`, given a `matching_lines` excerpt
/// from the stored `md_content` (when present), and grouped by category.
pub fn search_documents(index: &SearchIndex, raw_query: &str, limit: usize) -> GroupedResults {
    let parsed = parse_query(raw_query);
    let filters = parsed.filters.clone();
    let keep = move |stored: &StoredFields| filters.matches(stored);

    let hits = index.search_with(&parsed.text, &index.options().search, Some(&keep));

    let flat: Vec<ResultDocument> = hits
        .into_iter()
        .take(limit)
        .map(|hit| {
            let content = hit
                .stored
                .get("md_content")
                .and_then(Value::as_str)
                .unwrap_or("");
            let category = hit
                .stored
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            ResultDocument {
                matching_lines: matching_lines(content, &parsed.text),
                id: hit.id,
                score: hit.score,
                category,
                stored: hit.stored,
            }
        })
        .collect();

    GroupedResults {
        grouped: group_by_category(&flat),
        flat,
    }
}

/// Look up a stored document by its `file_path`.
pub fn document_by_path<'a>(index: &'a SearchIndex, file_path: &str) -> Option<(&'a str, &'a StoredFields)> {
    index.stored_documents().find(|(_, stored)| {
        stored.get("file_path").and_then(Value::as_str) == Some(file_path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexOptions;
    use crate::models::IndexDocument;

    fn doc(id: &str, path: &str, title: &str, authors: &[&str], tags: &[&str]) -> IndexDocument {
        IndexDocument {
            id: id.to_string(),
            file_path: path.to_string(),
            title: title.to_string(),
            description: "shared description".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            date: String::new(),
            category: crate::records::extract_category(path),
            spr_content: None,
            md_content: Some(format!("# {}\n\nSome text about [rust](https://rust-lang.org) here.", title)),
        }
    }

    fn index() -> SearchIndex {
        let mut options = IndexOptions::default();
        options.store_fields.push("md_content".to_string());
        let mut index = SearchIndex::new(options);
        index
            .add_all(&[
                doc("0", "lang/rust/intro.md", "Rust intro", &["alice"], &["lang"]),
                doc("1", "lang/go/intro.md", "Go intro", &["bob"], &["lang", "go"]),
                doc("2", "ops/deploy.md", "Deploy rust", &["alice"], &["ops"]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_parse_plain_query() {
        let parsed = parse_query("hello world");
        assert_eq!(parsed.text, "hello world");
        assert!(parsed.filters.is_empty());
    }

    #[test]
    fn test_parse_all_filter_kinds() {
        let parsed = parse_query("title:intro author:bob @carol tag:ops #lang#go text");
        assert_eq!(parsed.text, "text");
        assert_eq!(parsed.filters.title.as_deref(), Some("intro"));
        assert_eq!(parsed.filters.authors, vec!["bob", "carol"]);
        assert_eq!(parsed.filters.tags, vec!["ops", "lang", "go"]);
    }

    #[test]
    fn test_filters_case_insensitive_substring() {
        let filters = QueryFilters {
            authors: vec!["ALI".to_string()],
            ..Default::default()
        };
        let idx = index();
        assert!(filters.matches(idx.stored("0").unwrap()));
        assert!(!filters.matches(idx.stored("1").unwrap()));
    }

    #[test]
    fn test_search_documents_applies_filters() {
        let results = search_documents(&index(), "intro @bob", 10);
        let ids: Vec<&str> = results.flat.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_search_documents_groups_by_category() {
        let results = search_documents(&index(), "rust", 10);
        assert_eq!(results.flat.len(), 2);
        assert!(results.grouped.contains_key("lang > rust"));
        assert!(results.grouped.contains_key("ops"));
    }

    #[test]
    fn test_search_documents_limit() {
        let results = search_documents(&index(), "intro", 1);
        assert_eq!(results.flat.len(), 1);
    }

    #[test]
    fn test_markdown_to_plain_text() {
        let text = markdown_to_plain_text("**bold** ![img](a.png) [link](http://x) `code`");
        assert_eq!(text, "bold  link code");
    }

    #[test]
    fn test_matching_lines_highlight() {
        let excerpt = matching_lines("first\nabout [Rust](http://r) today", "rust");
        assert_eq!(excerpt, "...about <span>Rust</span> today...");
    }

    #[test]
    fn test_matching_lines_no_match() {
        assert_eq!(matching_lines("nothing here", "rust"), "");
        assert_eq!(matching_lines("", "rust"), "");
    }

    #[test]
    fn test_matching_lines_trimmed_without_splitting_highlight() {
        let line = format!("{} rust tail words", "word ".repeat(30));
        let excerpt = matching_lines(&line, "rust");
        assert!(excerpt.starts_with("..."));
        assert!(excerpt.ends_with("..."));
        let inner = excerpt.trim_matches('.');
        assert_eq!(inner.matches("<span>").count(), inner.matches("</span>").count());
        assert!(inner.chars().count() <= EXCERPT_CHARS);
    }

    #[test]
    fn test_document_by_path() {
        let idx = index();
        let (id, stored) = document_by_path(&idx, "ops/deploy.md").unwrap();
        assert_eq!(id, "2");
        assert_eq!(stored["title"], "Deploy rust");
        assert!(document_by_path(&idx, "missing.md").is_none());
    }
}
