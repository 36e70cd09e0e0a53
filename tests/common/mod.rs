//! Shared fixtures: write small vault parquet files and configs.

#![allow(dead_code)]

use arrow_array::builder::{Float32Builder, ListBuilder, StringBuilder};
use arrow_array::{ArrayRef, BooleanArray, RecordBatch, StringArray};
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default, Clone)]
pub struct VaultRow {
    pub file_path: &'static str,
    pub title: Option<&'static str>,
    pub description: Option<&'static str>,
    pub tags: Vec<&'static str>,
    pub authors: Vec<&'static str>,
    pub date: Option<&'static str>,
    pub draft: Option<bool>,
    pub hiring: Option<bool>,
    pub status: Option<&'static str>,
    pub md_content: Option<&'static str>,
    pub embeddings: Option<Vec<f32>>,
}

fn string_column<F>(rows: &[VaultRow], f: F) -> ArrayRef
where
    F: Fn(&VaultRow) -> Option<&'static str>,
{
    Arc::new(rows.iter().map(f).collect::<StringArray>())
}

fn list_column<F>(rows: &[VaultRow], f: F) -> ArrayRef
where
    F: Fn(&VaultRow) -> &[&'static str],
{
    let mut builder = ListBuilder::new(StringBuilder::new());
    for row in rows {
        for value in f(row) {
            builder.values().append_value(value);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn embedding_column(rows: &[VaultRow]) -> ArrayRef {
    let mut builder = ListBuilder::new(Float32Builder::new());
    for row in rows {
        match &row.embeddings {
            Some(values) => {
                for v in values {
                    builder.values().append_value(*v);
                }
                builder.append(true);
            }
            None => builder.append(false),
        }
    }
    Arc::new(builder.finish())
}

/// Write `rows` as a vault parquet file at `path`.
pub fn write_vault(path: &Path, rows: &[VaultRow]) {
    let batch = RecordBatch::try_from_iter(vec![
        ("file_path", string_column(rows, |r| Some(r.file_path))),
        ("title", string_column(rows, |r| r.title)),
        ("description", string_column(rows, |r| r.description)),
        ("tags", list_column(rows, |r| r.tags.as_slice())),
        ("authors", list_column(rows, |r| r.authors.as_slice())),
        ("date", string_column(rows, |r| r.date)),
        (
            "draft",
            Arc::new(rows.iter().map(|r| r.draft).collect::<BooleanArray>()) as ArrayRef,
        ),
        (
            "hiring",
            Arc::new(rows.iter().map(|r| r.hiring).collect::<BooleanArray>()) as ArrayRef,
        ),
        ("status", string_column(rows, |r| r.status)),
        ("md_content", string_column(rows, |r| r.md_content)),
        ("embeddings", embedding_column(rows)),
    ])
    .unwrap();

    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

/// The three-page vault: one indexable guide, one draft, one without a
/// description.
pub fn sample_rows() -> Vec<VaultRow> {
    vec![
        VaultRow {
            file_path: "guides/alpha.md",
            title: Some("Alpha Guide"),
            description: Some("Intro"),
            tags: vec!["x"],
            authors: vec!["Ann"],
            date: Some("2024-01-01"),
            draft: Some(false),
            status: Some("Open"),
            md_content: Some("# Alpha\n\nAlpha deployment steps.\n\nRoll back with care."),
            embeddings: Some(vec![1.0, 0.0, 0.0]),
            ..Default::default()
        },
        VaultRow {
            file_path: "guides/beta.md",
            title: Some("Beta"),
            description: Some("Draft notes"),
            draft: Some(true),
            md_content: Some("Beta deployment draft."),
            embeddings: Some(vec![0.0, 1.0, 0.0]),
            ..Default::default()
        },
        VaultRow {
            file_path: "gamma.md",
            title: Some("Gamma"),
            description: None,
            md_content: Some("Gamma has no description."),
            ..Default::default()
        },
    ]
}

/// Temp dir holding `vault.parquet` and a config pointing at it.
pub struct TestEnv {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl TestEnv {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn vault(&self) -> PathBuf {
        self.path("vault.parquet")
    }

    pub fn index(&self) -> PathBuf {
        self.path("out/search-index.json")
    }
}

/// Write the sample vault and a config with a short queue delay.
pub fn setup_test_env() -> TestEnv {
    setup_test_env_with(&sample_rows(), "")
}

/// Like [`setup_test_env`] with custom rows and extra TOML appended to
/// the config.
pub fn setup_test_env_with(rows: &[VaultRow], extra: &str) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_vault(&root.join("vault.parquet"), rows);

    let config = format!(
        r#"[source]
path = "{vault}"

[index]
output = "{index}"
store_content = true

[runtime]
connect_timeout_secs = 10

[queue]
delay_ms = 10
{extra}
"#,
        vault = root.join("vault.parquet").display(),
        index = root.join("out/search-index.json").display(),
        extra = extra,
    );
    let config_path = root.join("vsearch.toml");
    std::fs::write(&config_path, config).unwrap();

    TestEnv { dir, config_path }
}
