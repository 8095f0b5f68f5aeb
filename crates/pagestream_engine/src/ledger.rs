use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::output::{Artifact, Output};
use crate::persist::{remove_if_present, PersistError};
use crate::FaultKind;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("ledger line {line} is malformed: {reason}")]
    Malformed { line: u64, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerRow {
    Success { size: u64, name: String, url: String },
    Error { kind: FaultKind, url: String },
}

impl LedgerRow {
    pub fn url(&self) -> &str {
        match self {
            LedgerRow::Success { url, .. } | LedgerRow::Error { url, .. } => url,
        }
    }

    fn to_record(&self) -> [String; 3] {
        match self {
            LedgerRow::Success { size, name, url } => [size.to_string(), name.clone(), url.clone()],
            LedgerRow::Error { kind, url } => {
                [kind.label().to_string(), String::new(), url.clone()]
            }
        }
    }

    fn from_record(record: &csv::StringRecord, line: u64) -> Result<Self, LedgerError> {
        let (Some(first), Some(name), Some(url)) = (record.get(0), record.get(1), record.get(2))
        else {
            return Err(LedgerError::Malformed {
                line,
                reason: format!("expected 3 fields, found {}", record.len()),
            });
        };
        if let Ok(size) = first.parse::<u64>() {
            return Ok(LedgerRow::Success {
                size,
                name: name.to_string(),
                url: url.to_string(),
            });
        }
        match FaultKind::from_label(first) {
            Some(kind) => Ok(LedgerRow::Error {
                kind,
                url: url.to_string(),
            }),
            None => Err(LedgerError::Malformed {
                line,
                reason: format!("unknown first field {first:?}"),
            }),
        }
    }
}

pub type LedgerRows = Box<dyn Iterator<Item = Result<LedgerRow, LedgerError>> + Send>;

/// Append-only provenance log of artifacts and faults.
pub trait Ledger: Send {
    /// Append a success row. Does nothing for a page without rows.
    fn record_success(&mut self, output: &dyn Output, artifact: &Artifact)
        -> Result<(), LedgerError>;

    fn record_error(&mut self, kind: FaultKind, url: &str) -> Result<(), LedgerError>;

    /// Remove the ledger, first removing every artifact it references when `cascade` is set.
    fn delete(&mut self, cascade: bool) -> Result<(), LedgerError>;

    /// Lazily read back the rows written so far, in write order.
    fn rows(&self) -> Result<LedgerRows, LedgerError>;

    /// Directory that the artifact names in success rows are relative to, when the ledger
    /// resolves them itself (cascading delete).
    fn artifact_dir(&self) -> Option<&Path> {
        None
    }

    /// Source URLs that already have a success row.
    fn completed_urls(&self) -> Result<HashSet<String>, LedgerError> {
        let mut urls = HashSet::new();
        for row in self.rows()? {
            if let LedgerRow::Success { url, .. } = row? {
                urls.insert(url);
            }
        }
        Ok(urls)
    }
}

/// Ledger stored as `{dir}/{name}.ledger.csv`, three comma-separated columns, no header.
///
/// Artifacts are expected next to the ledger in `dir`.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    dir: PathBuf,
    path: PathBuf,
}

impl CsvLedger {
    pub const EXTENSION: &'static str = "ledger.csv";

    /// Creates the directory if needed; the file itself appears with the first row.
    pub fn open(dir: &Path, name: &str) -> Result<Self, LedgerError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            path: dir.join(format!("{name}.{}", Self::EXTENSION)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, row: &LedgerRow) -> Result<(), LedgerError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(row.to_record())?;
        writer.flush()?;
        Ok(())
    }
}

impl Ledger for CsvLedger {
    fn record_success(
        &mut self,
        output: &dyn Output,
        artifact: &Artifact,
    ) -> Result<(), LedgerError> {
        if output.page().content().is_empty() {
            return Ok(());
        }
        self.append(&LedgerRow::Success {
            size: artifact.size,
            name: artifact.name.clone(),
            url: output.page().url().to_string(),
        })
    }

    fn record_error(&mut self, kind: FaultKind, url: &str) -> Result<(), LedgerError> {
        self.append(&LedgerRow::Error {
            kind,
            url: url.to_string(),
        })
    }

    fn artifact_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn delete(&mut self, cascade: bool) -> Result<(), LedgerError> {
        if cascade {
            for row in self.rows()? {
                if let LedgerRow::Success { name, .. } = row? {
                    remove_if_present(&self.dir.join(name))?;
                }
            }
        }
        remove_if_present(&self.path)?;
        Ok(())
    }

    fn rows(&self) -> Result<LedgerRows, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()));
            }
            Err(err) => return Err(err.into()),
        };
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        Ok(Box::new(reader.into_records().zip(1u64..).map(
            |(record, line)| {
                let record = record?;
                LedgerRow::from_record(&record, line)
            },
        )))
    }
}
