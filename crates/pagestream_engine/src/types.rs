use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use pagestream_core::RunPhase;
use reqwest::header::HeaderMap;

/// A single guarded request: one URL, its headers and its own deadline.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub url: String,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    /// Case-insensitive header lookup; values that are not visible ASCII are ignored.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FaultKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

/// Classification of everything that can go wrong for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The remote side dropped the connection mid-request.
    Disconnect,
    /// No connection could be established.
    ConnectFailure,
    /// The per-request deadline passed.
    RequestTimeout,
    /// The umbrella batch deadline passed while the task was outstanding.
    BatchTimeout,
    InvalidUrl,
    /// The body could not be adapted or the serializer rejected its shape.
    InvalidContent,
    /// Writing the artifact or its ledger row failed.
    Persist,
}

impl FaultKind {
    /// Label written to the ledger's first column for error rows.
    pub fn label(self) -> &'static str {
        match self {
            FaultKind::Disconnect => "disconnect",
            FaultKind::ConnectFailure => "connect-failure",
            FaultKind::RequestTimeout => "request-timeout",
            FaultKind::BatchTimeout => "batch-timeout",
            FaultKind::InvalidUrl => "invalid-url",
            FaultKind::InvalidContent => "invalid-content",
            FaultKind::Persist => "persist",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [
            FaultKind::Disconnect,
            FaultKind::ConnectFailure,
            FaultKind::RequestTimeout,
            FaultKind::BatchTimeout,
            FaultKind::InvalidUrl,
            FaultKind::InvalidContent,
            FaultKind::Persist,
        ]
        .into_iter()
        .find(|kind| kind.label() == label)
    }

    /// Whether the fault leaves an error row in the ledger.
    ///
    /// Connect failures and per-request timeouts are dropped silently, batch timeouts never
    /// reach the ledger because the abandoned tasks produce nothing.
    pub fn records_error_row(self) -> bool {
        matches!(
            self,
            FaultKind::Disconnect | FaultKind::InvalidUrl | FaultKind::InvalidContent
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Totals reported when a run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: u64,
    pub pages_fetched: u64,
    pub artifacts_written: u64,
    pub artifacts_deleted: u64,
    /// Tasks dropped because the batch deadline passed.
    pub abandoned: u64,
    pub faults: HashMap<FaultKind, u64>,
    pub depleted: bool,
    pub phase: RunPhase,
}

impl RunSummary {
    pub fn fault_count(&self, kind: FaultKind) -> u64 {
        self.faults.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn record_fault(&mut self, kind: FaultKind, count: u64) {
        if count > 0 {
            *self.faults.entry(kind).or_insert(0) += count;
        }
    }
}
