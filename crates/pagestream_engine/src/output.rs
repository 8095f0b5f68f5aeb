use std::path::{Path, PathBuf};

use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::content::Content;
use crate::naming::{artifact_file_name, domain, stable_id};
use crate::persist::{remove_if_present, ArtifactWriter, PersistError};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("{url} cannot be written as {format}: {reason}")]
    Shape {
        url: String,
        format: &'static str,
        reason: String,
    },
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Serializer pass-through options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub delimiter: u8,
    pub include_header: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            include_header: true,
        }
    }
}

/// One fetched page and where its artifact goes.
#[derive(Debug, Clone)]
pub struct Page {
    content: Content,
    url: String,
    id: String,
    domain: String,
    headers: HeaderMap,
    target_dir: PathBuf,
}

impl Page {
    pub fn new(content: Content, url: &str, headers: HeaderMap, target_dir: &Path) -> Self {
        Self {
            content,
            url: url.to_string(),
            id: stable_id(url),
            domain: domain(url),
            headers,
            target_dir: target_dir.to_path_buf(),
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }
}

/// A file written for a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Turns a page into a durable artifact.
///
/// Implementors only choose an extension and an encoding; naming, flushing and deletion
/// are shared so every format lands at `{target}/{stable id}.{extension}`.
pub trait Output: Send + Sync {
    fn page(&self) -> &Page;

    fn extension(&self) -> String;

    /// Serialize the page into an in-memory buffer.
    fn encode(&self, options: &FormatOptions) -> Result<Vec<u8>, OutputError>;

    fn file_name(&self) -> String {
        artifact_file_name(self.page().id(), &self.extension())
    }

    fn path(&self) -> PathBuf {
        self.page().target_dir().join(self.file_name())
    }

    fn flush(&self, buffer: &[u8]) -> Result<Artifact, OutputError> {
        let name = self.file_name();
        let file = ArtifactWriter::new(self.page().target_dir())
            .write(&name, buffer)?;
        Ok(Artifact {
            name,
            path: file.path,
            size: file.size,
        })
    }

    fn write(&self, options: &FormatOptions) -> Result<Artifact, OutputError> {
        let buffer = self.encode(options)?;
        self.flush(&buffer)
    }

    /// Best-effort removal; returns `false` when the artifact was already gone.
    fn delete(&self) -> Result<bool, OutputError> {
        Ok(remove_if_present(&self.path())?)
    }
}

/// Delimited text with a header taken from the first record's keys.
#[derive(Debug, Clone)]
pub struct CsvOutput {
    page: Page,
}

impl CsvOutput {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    fn shape_error(&self, reason: impl Into<String>) -> OutputError {
        OutputError::Shape {
            url: self.page.url.clone(),
            format: "csv",
            reason: reason.into(),
        }
    }
}

impl Output for CsvOutput {
    fn page(&self) -> &Page {
        &self.page
    }

    fn extension(&self) -> String {
        "csv".to_string()
    }

    fn encode(&self, options: &FormatOptions) -> Result<Vec<u8>, OutputError> {
        let (header, rows) = match &self.page.content {
            Content::Empty => return Ok(Vec::new()),
            Content::Records(records) => {
                tabulate(records.iter()).map_err(|reason| self.shape_error(reason))?
            }
            Content::Record(record) => {
                tabulate(std::iter::once(record)).map_err(|reason| self.shape_error(reason))?
            }
            Content::Scalars(values) => (
                vec!["col0".to_string()],
                values.iter().map(|value| vec![cell(value)]).collect(),
            ),
            Content::Opaque(_) => return Err(self.shape_error("content is not row-shaped")),
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .from_writer(Vec::new());
        if options.include_header {
            writer
                .write_record(&header)
                .map_err(|err| OutputError::Encode(err.to_string()))?;
        }
        for row in &rows {
            writer
                .write_record(row)
                .map_err(|err| OutputError::Encode(err.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|err| OutputError::Encode(err.to_string()))
    }
}

type Table = (Vec<String>, Vec<Vec<String>>);

fn tabulate<'a>(records: impl Iterator<Item = &'a Map<String, Value>>) -> Result<Table, String> {
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let columns = header.get_or_insert_with(|| record.keys().cloned().collect());
        if let Some(extra) = record.keys().find(|key| !columns.contains(key)) {
            return Err(format!("row {index} has field {extra:?} missing from the header"));
        }
        rows.push(
            columns
                .iter()
                .map(|key| record.get(key).map(cell).unwrap_or_default())
                .collect(),
        );
    }
    Ok((header.unwrap_or_default(), rows))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Compact JSON of the page content.
#[derive(Debug, Clone)]
pub struct TextOutput {
    page: Page,
}

impl TextOutput {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

impl Output for TextOutput {
    fn page(&self) -> &Page {
        &self.page
    }

    fn extension(&self) -> String {
        "txt".to_string()
    }

    fn encode(&self, _options: &FormatOptions) -> Result<Vec<u8>, OutputError> {
        if self.page.content.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::to_vec(&self.page.content.to_json())
            .map_err(|err| OutputError::Encode(err.to_string()))
    }
}
