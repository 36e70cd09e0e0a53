//! Columnar source reader.
//!
//! Reads the vault's parquet file into [`SourceRecord`]s. Only the
//! requested columns are decoded: a projected schema is handed to the
//! row iterator of every row group, so wide content columns stay on disk
//! unless asked for.
//!
//! Coercion never fails. A null or mistyped scalar becomes `""`, a
//! non-list becomes an empty list, and null list entries are dropped.
//! Requested columns that the file doesn't have read as null.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat};
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::reader::RowIter;
use parquet::record::{Field, Row};
use parquet::schema::types::Type as SchemaType;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use vault_search_core::models::SourceRecord;

/// Columns needed to build the search index.
pub const INDEX_COLUMNS: &[&str] = &[
    "file_path",
    "title",
    "description",
    "tags",
    "authors",
    "date",
    "draft",
    "hiring",
    "status",
];

/// Columns imported into the query engine.
pub const ENGINE_COLUMNS: &[&str] = &[
    "file_path",
    "title",
    "description",
    "tags",
    "authors",
    "date",
    "draft",
    "hiring",
    "status",
    "md_content",
    "spr_content",
    "embeddings",
];

/// Read every row of the parquet file at `path`, decoding only `columns`.
pub fn read_source(path: &Path, columns: &[&str]) -> Result<Vec<SourceRecord>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open source file: {}", path.display()))?;
    let reader = SerializedFileReader::new(file)
        .with_context(|| format!("Failed to read parquet file: {}", path.display()))?;

    let metadata = reader.metadata();
    let full_schema = metadata.file_metadata().schema();
    let projected = build_projected_schema(full_schema, columns)?;

    let mut records = Vec::new();
    for rg_idx in 0..metadata.num_row_groups() {
        let row_group = reader
            .get_row_group(rg_idx)
            .with_context(|| format!("Failed to get row group {}", rg_idx))?;
        let rows = RowIter::from_row_group(Some(projected.clone()), row_group.as_ref())
            .with_context(|| format!("Failed to create row iterator for row group {}", rg_idx))?;

        for row in rows {
            let row = row.with_context(|| format!("Failed to read row in row group {}", rg_idx))?;
            records.push(row_to_record(&row));
        }
    }

    debug!(path = %path.display(), rows = records.len(), "read source");
    Ok(records)
}

/// Projected schema keeping the requested top-level columns that exist.
fn build_projected_schema(full_schema: &SchemaType, columns: &[&str]) -> Result<SchemaType> {
    let fields: Vec<Arc<SchemaType>> = full_schema
        .get_fields()
        .iter()
        .filter(|f| columns.contains(&f.name()))
        .cloned()
        .collect();

    for column in columns {
        if !fields.iter().any(|f| f.name() == *column) {
            debug!(column = *column, "column missing from source, reading as null");
        }
    }

    SchemaType::group_type_builder(full_schema.name())
        .with_fields(fields)
        .build()
        .context("Failed to build projected schema")
}

fn row_to_record(row: &Row) -> SourceRecord {
    let mut record = SourceRecord::default();
    for (name, field) in row.get_column_iter() {
        match name.as_str() {
            "file_path" => record.file_path = field_to_string(field),
            "title" => record.title = field_to_string(field),
            "description" => record.description = field_to_string(field),
            "tags" => record.tags = field_to_strings(field),
            "authors" => record.authors = field_to_strings(field),
            "date" => record.date = field_to_string(field),
            "draft" => record.draft = field_to_bool(field),
            "hiring" => record.hiring = field_to_bool(field),
            "status" => record.status = field_to_string(field),
            "md_content" => record.md_content = field_to_string(field),
            "spr_content" => record.spr_content = field_to_string(field),
            "embeddings" => record.embeddings = field_to_floats(field),
            _ => {}
        }
    }
    record
}

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Render a scalar as text. Dates become `YYYY-MM-DD` and timestamps
/// RFC 3339 in UTC; nested values and nulls become `""`.
fn field_to_string(field: &Field) -> String {
    match field {
        Field::Str(s) => s.clone(),
        Field::Bool(b) => b.to_string(),
        Field::Byte(v) => v.to_string(),
        Field::Short(v) => v.to_string(),
        Field::Int(v) => v.to_string(),
        Field::Long(v) => v.to_string(),
        Field::UByte(v) => v.to_string(),
        Field::UShort(v) => v.to_string(),
        Field::UInt(v) => v.to_string(),
        Field::ULong(v) => v.to_string(),
        Field::Float(v) => v.to_string(),
        Field::Double(v) => v.to_string(),
        Field::Date(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Field::TimestampMillis(ms) => {
            timestamp_to_string(ms.div_euclid(1_000), ms.rem_euclid(1_000) * 1_000_000)
        }
        Field::TimestampMicros(us) => {
            timestamp_to_string(us.div_euclid(1_000_000), us.rem_euclid(1_000_000) * 1_000)
        }
        Field::Bytes(bytes) => bytes.as_utf8().map(str::to_string).unwrap_or_default(),
        Field::Decimal(_) => field.to_string(),
        Field::Null | Field::Group(_) | Field::ListInternal(_) | Field::MapInternal(_) => {
            String::new()
        }
        #[allow(unreachable_patterns)]
        other => {
            debug!(value = %other, "unsupported scalar coerced to empty string");
            String::new()
        }
    }
}

fn timestamp_to_string(secs: i64, nanos: i64) -> String {
    DateTime::from_timestamp(secs, nanos as u32)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

fn field_to_bool(field: &Field) -> Option<bool> {
    match field {
        Field::Bool(b) => Some(*b),
        _ => None,
    }
}

fn field_to_strings(field: &Field) -> Vec<String> {
    match field {
        Field::ListInternal(list) => list
            .elements()
            .iter()
            .filter_map(|f| match f {
                Field::Str(s) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn field_to_floats(field: &Field) -> Vec<f32> {
    match field {
        Field::ListInternal(list) => list
            .elements()
            .iter()
            .filter_map(|f| match f {
                Field::Float(v) => Some(*v),
                Field::Double(v) => Some(*v as f32),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
