//! Inverted full-text index with field boosting, prefix and fuzzy matching.
//!
//! The index maps every term to the fields and documents containing it,
//! together with per-field term frequencies. Documents are addressed
//! internally by a dense short id; the external id is kept alongside.
//!
//! # Scoring
//!
//! For every query term the index collects candidate index terms:
//!
//! | Match | Weight |
//! |-------|--------|
//! | exact | `1.0` |
//! | prefix | `0.375 × q / (q + 0.3 × Δlen)` |
//! | fuzzy | `0.45 × q / (q + distance)` |
//!
//! where `q` is the query term length in chars. Each (term, field, doc)
//! posting contributes `weight × boost(field) × BM25+`, with
//! `k = 1.2`, `b = 0.7`, `d = 0.5`. Per-term scores are summed across
//! query terms and the total is multiplied by the number of distinct
//! query terms the document matched. Ties are broken by external id.
//!
//! # Serialization
//!
//! [`SearchIndex`] serializes to a self-contained JSON object with
//! camelCase keys. Loading it back requires the same [`IndexOptions`]
//! that were used to build it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::models::IndexDocument;
use crate::text::{bounded_levenshtein, tokenize};

/// Version tag written into every serialized index.
pub const SERIALIZATION_VERSION: u32 = 2;

const BM25_K: f64 = 1.2;
const BM25_B: f64 = 0.7;
const BM25_D: f64 = 0.5;
const PREFIX_WEIGHT: f64 = 0.375;
const FUZZY_WEIGHT: f64 = 0.45;

/// Stored fields of one document, as returned with search hits.
pub type StoredFields = Map<String, Value>;

/// A document that can be added to a [`SearchIndex`].
pub trait Indexable {
    /// External, unique document id.
    fn id(&self) -> &str;
    /// Text to tokenize for `field`. List fields are joined with spaces.
    fn field_text(&self, field: &str) -> String;
    /// JSON value of a stored field, or `None` to leave it out.
    fn stored_value(&self, field: &str) -> Option<Value>;
}

impl Indexable for IndexDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn field_text(&self, field: &str) -> String {
        match field {
            "file_path" => self.file_path.clone(),
            "title" => self.title.clone(),
            "description" => self.description.clone(),
            "tags" => self.tags.join(" "),
            "authors" => self.authors.join(" "),
            "date" => self.date.clone(),
            "category" => self.category.clone(),
            "spr_content" => self.spr_content.clone().unwrap_or_default(),
            "md_content" => self.md_content.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn stored_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::from(self.id.clone())),
            "file_path" => Some(Value::from(self.file_path.clone())),
            "title" => Some(Value::from(self.title.clone())),
            "description" => Some(Value::from(self.description.clone())),
            "tags" => Some(Value::from(self.tags.clone())),
            "authors" => Some(Value::from(self.authors.clone())),
            "date" => Some(Value::from(self.date.clone())),
            "category" => Some(Value::from(self.category.clone())),
            "spr_content" => self.spr_content.clone().map(Value::from),
            "md_content" => self.md_content.clone().map(Value::from),
            _ => None,
        }
    }
}

/// Query-time matching behaviour.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Per-field score multipliers; absent fields weigh `1.0`.
    pub boost: BTreeMap<String, f64>,
    /// Edit-distance tolerance. Below 1 it is a fraction of the term length.
    pub fuzzy: f64,
    /// Whether a query term also matches longer terms it prefixes.
    pub prefix: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        let boost = [("title", 2.0), ("tags", 1.5), ("authors", 1.2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            boost,
            fuzzy: 0.2,
            prefix: true,
        }
    }
}

/// Build-time index layout.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Fields tokenized into the inverted index.
    pub fields: Vec<String>,
    /// Fields kept verbatim for display with each hit.
    pub store_fields: Vec<String>,
    /// Default matching behaviour for [`SearchIndex::search`].
    pub search: SearchOptions,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            fields: ["title", "description", "tags", "authors"]
                .map(String::from)
                .to_vec(),
            store_fields: [
                "file_path",
                "title",
                "description",
                "tags",
                "authors",
                "date",
                "category",
            ]
            .map(String::from)
            .to_vec(),
            search: SearchOptions::default(),
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    /// Index terms that matched, sorted.
    pub terms: Vec<String>,
    /// Query terms that produced at least one match, in query order.
    pub query_terms: Vec<String>,
    /// Matched index term → fields it matched in.
    #[serde(rename = "match")]
    pub matches: BTreeMap<String, Vec<String>>,
    pub stored: StoredFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexData {
    document_count: usize,
    next_id: u32,
    document_ids: BTreeMap<u32, String>,
    field_ids: BTreeMap<String, u32>,
    field_length: BTreeMap<u32, Vec<u32>>,
    average_field_length: Vec<f64>,
    stored_fields: BTreeMap<u32, StoredFields>,
    index: BTreeMap<String, BTreeMap<u32, BTreeMap<u32, u32>>>,
    serialization_version: u32,
}

/// Inverted index over a fixed set of document fields.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    options: IndexOptions,
    data: IndexData,
    short_ids: HashMap<String, u32>,
}

impl Serialize for SearchIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

#[derive(Default)]
struct DocAccumulator {
    score: f64,
    query_terms: Vec<String>,
    matches: BTreeMap<String, BTreeSet<String>>,
}

impl SearchIndex {
    /// Create an empty index.
    pub fn new(options: IndexOptions) -> Self {
        let field_ids = options
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.clone(), i as u32))
            .collect();
        let data = IndexData {
            field_ids,
            average_field_length: vec![0.0; options.fields.len()],
            serialization_version: SERIALIZATION_VERSION,
            ..Default::default()
        };
        Self {
            options,
            data,
            short_ids: HashMap::new(),
        }
    }

    /// Restore an index from its serialized JSON form.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, an unknown serialization version, or a
    /// field layout that differs from `options.fields`.
    pub fn from_json(json: Value, options: IndexOptions) -> Result<Self> {
        let data: IndexData =
            serde_json::from_value(json).context("Failed to parse serialized search index")?;

        if data.serialization_version != SERIALIZATION_VERSION {
            bail!(
                "Unsupported search index version {} (expected {})",
                data.serialization_version,
                SERIALIZATION_VERSION
            );
        }
        for (i, field) in options.fields.iter().enumerate() {
            if data.field_ids.get(field) != Some(&(i as u32)) {
                bail!("Search index field layout does not match options (field '{}')", field);
            }
        }

        let short_ids = data
            .document_ids
            .iter()
            .map(|(short, id)| (id.clone(), *short))
            .collect();

        Ok(Self {
            options,
            data,
            short_ids,
        })
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn document_count(&self) -> usize {
        self.data.document_count
    }

    /// Stored fields for an external id.
    pub fn stored(&self, id: &str) -> Option<&StoredFields> {
        let short = self.short_ids.get(id)?;
        self.data.stored_fields.get(short)
    }

    /// Iterate stored fields of every document in insertion order.
    pub fn stored_documents(&self) -> impl Iterator<Item = (&str, &StoredFields)> {
        self.data.stored_fields.iter().filter_map(|(short, fields)| {
            self.data
                .document_ids
                .get(short)
                .map(|id| (id.as_str(), fields))
        })
    }

    /// Add one document.
    ///
    /// # Errors
    ///
    /// Fails if a document with the same id is already present.
    pub fn add<D: Indexable>(&mut self, doc: &D) -> Result<()> {
        let id = doc.id();
        if self.short_ids.contains_key(id) {
            bail!("Duplicate document id: {}", id);
        }

        let short = self.data.next_id;
        self.data.next_id += 1;
        self.data.document_ids.insert(short, id.to_string());
        self.short_ids.insert(id.to_string(), short);
        self.data.document_count += 1;

        let stored: StoredFields = self
            .options
            .store_fields
            .iter()
            .filter_map(|f| doc.stored_value(f).map(|v| (f.clone(), v)))
            .collect();
        self.data.stored_fields.insert(short, stored);

        let n = self.data.document_count as f64;
        let mut lengths = Vec::with_capacity(self.options.fields.len());
        for (field_id, field) in self.options.fields.iter().enumerate() {
            let terms = tokenize(&doc.field_text(field));
            lengths.push(terms.len() as u32);

            // Running mean over every document added so far.
            let avg = &mut self.data.average_field_length[field_id];
            *avg = (*avg * (n - 1.0) + terms.len() as f64) / n;

            let field_id = field_id as u32;

            for term in terms {
                *self
                    .data
                    .index
                    .entry(term)
                    .or_default()
                    .entry(field_id)
                    .or_default()
                    .entry(short)
                    .or_insert(0) += 1;
            }
        }
        self.data.field_length.insert(short, lengths);

        Ok(())
    }

    /// Add documents in order, stopping at the first duplicate id.
    pub fn add_all<'a, D, I>(&mut self, docs: I) -> Result<()>
    where
        D: Indexable + 'a,
        I: IntoIterator<Item = &'a D>,
    {
        for doc in docs {
            self.add(doc)?;
        }
        Ok(())
    }

    /// Search with the index's default [`SearchOptions`].
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        self.search_with(query, &self.options.search, None)
    }

    /// Search with explicit options and an optional stored-field filter.
    pub fn search_with(
        &self,
        query: &str,
        opts: &SearchOptions,
        filter: Option<&dyn Fn(&StoredFields) -> bool>,
    ) -> Vec<SearchHit> {
        let mut query_terms = tokenize(query);
        let mut seen = BTreeSet::new();
        query_terms.retain(|t| seen.insert(t.clone()));

        let mut docs: HashMap<u32, DocAccumulator> = HashMap::new();

        for query_term in &query_terms {
            for (term, weight) in self.expand_term(query_term, opts) {
                self.score_term(query_term, term, weight, opts, &mut docs);
            }
        }

        let mut hits: Vec<SearchHit> = docs
            .into_iter()
            .filter_map(|(short, acc)| {
                let id = self.data.document_ids.get(&short)?.clone();
                let stored = self.data.stored_fields.get(&short).cloned().unwrap_or_default();
                if let Some(keep) = filter {
                    if !keep(&stored) {
                        return None;
                    }
                }
                let quality = acc.query_terms.len().max(1) as f64;
                Some(SearchHit {
                    id,
                    score: acc.score * quality,
                    terms: acc.matches.keys().cloned().collect(),
                    query_terms: acc.query_terms,
                    matches: acc
                        .matches
                        .into_iter()
                        .map(|(t, fields)| (t, fields.into_iter().collect()))
                        .collect(),
                    stored,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| compare_ids(&a.id, &b.id))
        });
        hits
    }

    /// Collect index terms matching `query_term`, keeping the best weight for each.
    fn expand_term<'a>(&'a self, query_term: &str, opts: &SearchOptions) -> Vec<(&'a str, f64)> {
        let q_len = query_term.chars().count() as f64;
        let mut weights: BTreeMap<&'a str, f64> = BTreeMap::new();
        let mut keep_best = |term: &'a str, weight: f64| {
            let entry = weights.entry(term).or_insert(0.0);
            if weight > *entry {
                *entry = weight;
            }
        };

        if let Some((term, _)) = self.data.index.get_key_value(query_term) {
            keep_best(term.as_str(), 1.0);
        }

        if opts.prefix {
            let from = (Bound::Included(query_term), Bound::Unbounded);
            for (term, _) in self.data.index.range::<str, _>(from) {
                if !term.starts_with(query_term) {
                    break;
                }
                let distance = term.chars().count() as f64 - q_len;
                if distance > 0.0 {
                    keep_best(
                        term.as_str(),
                        PREFIX_WEIGHT * q_len / (q_len + 0.3 * distance),
                    );
                }
            }
        }

        let max_distance = if opts.fuzzy < 1.0 {
            (opts.fuzzy * q_len).round() as usize
        } else {
            opts.fuzzy as usize
        };
        if max_distance > 0 {
            for term in self.data.index.keys() {
                if let Some(distance) = bounded_levenshtein(query_term, term, max_distance) {
                    if distance > 0 {
                        keep_best(
                            term.as_str(),
                            FUZZY_WEIGHT * q_len / (q_len + distance as f64),
                        );
                    }
                }
            }
        }

        weights.into_iter().collect()
    }

    fn score_term(
        &self,
        query_term: &str,
        term: &str,
        weight: f64,
        opts: &SearchOptions,
        docs: &mut HashMap<u32, DocAccumulator>,
    ) {
        let Some(fields) = self.data.index.get(term) else {
            return;
        };
        let n_docs = self.data.document_count as f64;

        for (field_id, postings) in fields {
            let Some(field) = self.options.fields.get(*field_id as usize) else {
                continue;
            };
            let boost = opts.boost.get(field).copied().unwrap_or(1.0);
            let df = postings.len() as f64;
            let avg_len = self
                .data
                .average_field_length
                .get(*field_id as usize)
                .copied()
                .unwrap_or(0.0);

            for (short, tf) in postings {
                let field_len = self
                    .data
                    .field_length
                    .get(short)
                    .and_then(|l| l.get(*field_id as usize))
                    .copied()
                    .unwrap_or(0) as f64;
                let raw = bm25_plus(*tf as f64, df, n_docs, field_len, avg_len);

                let acc = docs.entry(*short).or_default();
                acc.score += weight * boost * raw;
                if acc.query_terms.last().map(String::as_str) != Some(query_term) {
                    acc.query_terms.push(query_term.to_string());
                }
                acc.matches
                    .entry(term.to_string())
                    .or_default()
                    .insert(field.clone());
            }
        }
    }
}

fn bm25_plus(tf: f64, df: f64, n_docs: f64, field_len: f64, avg_field_len: f64) -> f64 {
    let idf = (1.0 + (n_docs - df + 0.5) / (df + 0.5)).ln();
    let norm = if avg_field_len > 0.0 {
        field_len / avg_field_len
    } else {
        1.0
    };
    idf * (BM25_D + tf * (BM25_K + 1.0) / (tf + BM25_K * (1.0 - BM25_B + BM25_B * norm)))
}

/// Order numeric ids numerically, anything else lexically.
fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
