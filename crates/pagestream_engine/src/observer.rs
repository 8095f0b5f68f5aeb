use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};

use crate::{FaultKind, RunSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    BatchStarted {
        index: u64,
        size: usize,
    },
    BatchSkipped {
        index: u64,
    },
    PageFetched {
        url: String,
        status: u16,
        rows: usize,
    },
    PageFault {
        url: String,
        kind: FaultKind,
        message: String,
    },
    Depleted {
        url: String,
    },
    ContinuationMissing {
        url: Option<String>,
    },
    ArtifactWritten {
        url: String,
        name: String,
        size: u64,
    },
    ArtifactDeleted {
        url: String,
        name: String,
    },
    BatchTimedOut {
        index: u64,
        abandoned: usize,
    },
    BatchFinished {
        index: u64,
        completed: usize,
    },
    RunFinished(RunSummary),
}

/// Receives run events. Injected into the orchestrator instead of a hidden global.
pub trait RunObserver: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::BatchStarted { index, size } => {
                engine_debug!("batch {} dispatching {} url(s)", index, size);
            }
            RunEvent::BatchSkipped { index } => {
                engine_info!("batch {} skipped, every url already recorded", index);
            }
            RunEvent::PageFetched { url, status, rows } => {
                engine_debug!("fetched {} status={} rows={}", url, status, rows);
            }
            RunEvent::PageFault { url, kind, message } => match kind {
                FaultKind::RequestTimeout => engine_info!("{} dropped ({}): {}", url, kind, message),
                FaultKind::Persist => engine_error!("{} not persisted: {}", url, message),
                _ => engine_warn!("{} failed ({}): {}", url, kind, message),
            },
            RunEvent::Depleted { url } => {
                engine_info!("empty page at {}, no further batch will be requested", url);
            }
            RunEvent::ContinuationMissing { url } => match url {
                Some(url) => engine_info!("{} carried no continuation, stream ends", url),
                None => engine_warn!("no response to continue from, stream ends"),
            },
            RunEvent::ArtifactWritten { url, name, size } => {
                engine_info!("wrote {} ({} bytes) for {}", name, size, url);
            }
            RunEvent::ArtifactDeleted { url, name } => {
                engine_debug!("removed ephemeral {} for {}", name, url);
            }
            RunEvent::BatchTimedOut { index, abandoned } => {
                engine_warn!("batch {} timed out, abandoning {} task(s)", index, abandoned);
            }
            RunEvent::BatchFinished { index, completed } => {
                engine_debug!("batch {} finished with {} completed task(s)", index, completed);
            }
            RunEvent::RunFinished(summary) => {
                engine_info!(
                    "run finished: batches={} pages={} artifacts={} abandoned={} depleted={}",
                    summary.batches,
                    summary.pages_fetched,
                    summary.artifacts_written,
                    summary.abandoned,
                    summary.depleted
                );
            }
        }
    }
}
