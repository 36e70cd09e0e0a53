//! Reading vault files whose columns are not plain strings.

use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{ArrayRef, Date32Array, RecordBatch, StringArray, TimestampMillisecondArray};
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use vault_search::config::Config;
use vault_search::search::search_index_file;
use vault_search::source::{read_source, INDEX_COLUMNS};

fn write_batch(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

/// Two pages: tags with null and empty entries, a null authors list, and
/// `date` stored as a DATE column.
fn typed_vault(path: &Path) {
    let mut tags = ListBuilder::new(StringBuilder::new());
    tags.values().append_value("x");
    tags.values().append_null();
    tags.values().append_value("");
    tags.values().append_value("y");
    tags.append(true);
    tags.append(false);

    let mut authors = ListBuilder::new(StringBuilder::new());
    authors.append(false);
    authors.values().append_value("Ann");
    authors.append(true);

    let batch = RecordBatch::try_from_iter(vec![
        (
            "file_path",
            Arc::new(StringArray::from(vec!["a.md", "b.md"])) as ArrayRef,
        ),
        (
            "title",
            Arc::new(StringArray::from(vec!["Rust old", "Rust new"])) as ArrayRef,
        ),
        (
            "description",
            Arc::new(StringArray::from(vec!["notes", "notes"])) as ArrayRef,
        ),
        ("tags", Arc::new(tags.finish()) as ArrayRef),
        ("authors", Arc::new(authors.finish()) as ArrayRef),
        // 2023-01-01 and 2024-01-01
        (
            "date",
            Arc::new(Date32Array::from(vec![19_358, 19_723])) as ArrayRef,
        ),
    ])
    .unwrap();
    write_batch(path, &batch);
}

#[test]
fn test_list_entries_cleaned() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vault.parquet");
    typed_vault(&path);

    let records = read_source(&path, INDEX_COLUMNS).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tags, vec!["x".to_string(), "y".to_string()]);
    assert!(records[0].authors.is_empty());
    assert!(records[1].tags.is_empty());
    assert_eq!(records[1].authors, vec!["Ann".to_string()]);
}

#[test]
fn test_date_column_read_as_iso_text() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vault.parquet");
    typed_vault(&path);

    let records = read_source(&path, INDEX_COLUMNS).unwrap();
    assert_eq!(records[0].date, "2023-01-01");
    assert_eq!(records[1].date, "2024-01-01");
    // Columns absent from the file read as null.
    assert_eq!(records[0].status, "");
    assert_eq!(records[0].draft, None);
}

#[test]
fn test_timestamp_column_read_as_rfc3339() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vault.parquet");
    let batch = RecordBatch::try_from_iter(vec![
        (
            "file_path",
            Arc::new(StringArray::from(vec!["a.md"])) as ArrayRef,
        ),
        (
            "date",
            Arc::new(
                TimestampMillisecondArray::from(vec![1_704_103_200_000]).with_timezone("UTC"),
            ) as ArrayRef,
        ),
    ])
    .unwrap();
    write_batch(&path, &batch);

    let records = read_source(&path, INDEX_COLUMNS).unwrap();
    assert_eq!(records[0].date, "2024-01-01T10:00:00Z");
}

#[test]
fn test_since_filter_with_date_column() {
    let tmp = TempDir::new().unwrap();
    let vault = tmp.path().join("vault.parquet");
    typed_vault(&vault);

    let mut config = Config::for_source(vault.clone());
    config.index.output = tmp.path().join("index.json");
    vault_search::build_index::run_build_index(&config, None, true)
        .unwrap()
        .unwrap();

    let recent =
        search_index_file(&config, &config.index.output, "rust", Some("2023-06-01"), None).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, "1");
}
