//! Batch-at-a-time fetch loop: concurrent dispatch inside a batch, strictly sequential
//! batches, termination on the first empty page.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use pagestream_core::{update, BatchError, Batcher, PageStream, PhaseMsg, RunPhase, RunState};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::adapter::PageAdapter;
use crate::compress::CompressionFactory;
use crate::fetch::{guarded_fetch, Transport};
use crate::ledger::Ledger;
use crate::observer::{LogObserver, RunEvent, RunObserver};
use crate::output::{FormatOptions, OutputError};
use crate::persist::{ensure_output_dir, PersistError};
use crate::{FaultKind, FetchError, FetchResponse, FetchTask, RunSummary};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a response adapter is required")]
    MissingAdapter,
    #[error("a target directory is required")]
    MissingTargetDir,
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("max concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("ledger keeps artifacts in {}, not in the target directory {}", ledger.display(), target.display())]
    LedgerDirMismatch { ledger: PathBuf, target: PathBuf },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("target directory unusable: {0}")]
    TargetDir(#[from] PersistError),
}

/// Tunables for a run. Required collaborators are given to the builder instead.
#[derive(Clone)]
pub struct RunConfig {
    pub headers: HeaderMap,
    pub request_timeout: Duration,
    pub batch_timeout: Duration,
    pub batch_size: usize,
    /// Permits per batch; `None` lets the whole batch run at once.
    pub max_concurrency: Option<usize>,
    /// Delete each artifact as soon as it is written and recorded.
    pub ephemeral: bool,
    pub compression: Option<CompressionFactory>,
    pub format: FormatOptions,
    /// Keep one session for the whole run. Ignored for response-driven streams.
    pub reuse_session: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            request_timeout: Duration::from_secs(20),
            batch_timeout: Duration::from_secs(30),
            batch_size: 5,
            max_concurrency: None,
            ephemeral: false,
            compression: None,
            format: FormatOptions::default(),
            reuse_session: false,
        }
    }
}

/// Build a header map from name/value pairs, rejecting invalid names or values.
pub fn header_map<I, K, V>(pairs: I) -> Result<HeaderMap, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = name.as_ref();
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| ConfigError::InvalidHeader {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value.as_ref()).map_err(|err| ConfigError::InvalidHeader {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub struct OrchestratorBuilder<T, S, L> {
    transport: T,
    stream: S,
    ledger: L,
    adapter: Option<Arc<dyn PageAdapter>>,
    target_dir: Option<PathBuf>,
    config: RunConfig,
    observer: Arc<dyn RunObserver>,
    cancel: CancellationToken,
    skip_urls: HashSet<String>,
}

impl<T, S, L> OrchestratorBuilder<T, S, L>
where
    T: Transport,
    S: PageStream,
    L: Ledger,
{
    pub fn adapter(mut self, adapter: impl PageAdapter + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Checked between batches only; a batch in flight always completes.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// URLs that already have an artifact. They are dropped before dispatch, except for
    /// response-driven streams, which need every response to continue.
    pub fn skip_urls(mut self, urls: HashSet<String>) -> Self {
        self.skip_urls = urls;
        self
    }

    pub fn build(self) -> Result<FetchOrchestrator<T, S, L>, ConfigError> {
        let adapter = self.adapter.ok_or(ConfigError::MissingAdapter)?;
        let target_dir = self.target_dir.ok_or(ConfigError::MissingTargetDir)?;
        if let Some(ledger_dir) = self.ledger.artifact_dir() {
            if !same_dir(ledger_dir, &target_dir) {
                return Err(ConfigError::LedgerDirMismatch {
                    ledger: ledger_dir.to_path_buf(),
                    target: target_dir,
                });
            }
        }
        if self.config.max_concurrency == Some(0) {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.config.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("request"));
        }
        if self.config.batch_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("batch"));
        }
        let batcher = Batcher::new(self.stream, self.config.batch_size)?;
        let skip_urls = if batcher.is_response_driven() {
            HashSet::new()
        } else {
            self.skip_urls
        };
        Ok(FetchOrchestrator {
            transport: self.transport,
            batcher,
            ledger: self.ledger,
            adapter,
            target_dir,
            config: self.config,
            observer: self.observer,
            cancel: self.cancel,
            skip_urls,
        })
    }
}

pub struct FetchOrchestrator<T, S, L> {
    transport: T,
    batcher: Batcher<S>,
    ledger: L,
    adapter: Arc<dyn PageAdapter>,
    target_dir: PathBuf,
    config: RunConfig,
    observer: Arc<dyn RunObserver>,
    cancel: CancellationToken,
    skip_urls: HashSet<String>,
}

impl<T, S, L> FetchOrchestrator<T, S, L>
where
    T: Transport,
    S: PageStream,
    L: Ledger,
{
    pub fn builder(transport: T, stream: S, ledger: L) -> OrchestratorBuilder<T, S, L> {
        OrchestratorBuilder {
            transport,
            stream,
            ledger,
            adapter: None,
            target_dir: None,
            config: RunConfig::default(),
            observer: Arc::new(LogObserver),
            cancel: CancellationToken::new(),
            skip_urls: HashSet::new(),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn into_ledger(self) -> L {
        self.ledger
    }

    pub fn batcher(&self) -> &Batcher<S> {
        &self.batcher
    }

    /// Drive batches until the stream ends, a page comes back empty or a stop is requested.
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        ensure_output_dir(&self.target_dir)?;

        let mut state = RunState::new();
        let mut summary = RunSummary::default();
        let response_driven = self.batcher.is_response_driven();
        let reuse = self.config.reuse_session && !response_driven;
        let mut shared_session: Option<T::Session> = None;

        while state.accepts_batches() {
            if self.cancel.is_cancelled() {
                state = update(state, PhaseMsg::StopRequested);
                break;
            }
            let Some(batch) = self.batcher.next_batch() else {
                state = update(state, PhaseMsg::StreamExhausted);
                break;
            };
            let index = batch.index();
            let urls: Vec<String> = batch
                .into_urls()
                .into_iter()
                .filter(|url| !self.skip_urls.contains(url))
                .collect();
            if urls.is_empty() {
                self.observer.emit(RunEvent::BatchSkipped { index });
                continue;
            }

            summary.batches += 1;
            self.observer.emit(RunEvent::BatchStarted {
                index,
                size: urls.len(),
            });

            let fresh_session;
            let session = if reuse {
                if shared_session.is_none() {
                    shared_session = self.open_session(&urls, &mut summary);
                }
                shared_session.as_ref()
            } else {
                fresh_session = self.open_session(&urls, &mut summary);
                fresh_session.as_ref()
            };

            let completed = match session {
                Some(session) => {
                    self.dispatch_batch(session, index, urls, &mut state, &mut summary)
                        .await
                }
                None => {
                    if response_driven {
                        self.observer
                            .emit(RunEvent::ContinuationMissing { url: None });
                        self.batcher.advance(None);
                    }
                    0
                }
            };

            self.observer
                .emit(RunEvent::BatchFinished { index, completed });
            state = update(state, PhaseMsg::BatchFinished);
        }

        debug_assert_eq!(state.phase(), RunPhase::Done);
        summary.phase = state.phase();
        summary.depleted = state.is_depleted();
        self.observer.emit(RunEvent::RunFinished(summary.clone()));
        Ok(summary)
    }

    /// A session that cannot be opened fails every URL of the batch as a connect failure.
    fn open_session(&self, urls: &[String], summary: &mut RunSummary) -> Option<T::Session> {
        match self.transport.open_session() {
            Ok(session) => Some(session),
            Err(err) => {
                summary.record_fault(FaultKind::ConnectFailure, urls.len() as u64);
                for url in urls {
                    self.observer.emit(RunEvent::PageFault {
                        url: url.clone(),
                        kind: FaultKind::ConnectFailure,
                        message: err.message.clone(),
                    });
                }
                None
            }
        }
    }

    /// Fetch every URL concurrently and handle each result as it completes.
    /// Returns the number of tasks that completed before the batch deadline.
    async fn dispatch_batch(
        &mut self,
        session: &T::Session,
        index: u64,
        urls: Vec<String>,
        state: &mut RunState,
        summary: &mut RunSummary,
    ) -> usize {
        let Self {
            transport,
            batcher,
            ledger,
            adapter,
            target_dir,
            config,
            observer,
            ..
        } = self;
        let transport = &*transport;
        let config = &*config;

        let permits = config.max_concurrency.unwrap_or(urls.len()).max(1);
        let semaphore = Semaphore::new(permits);
        let semaphore = &semaphore;

        let mut pending: FuturesUnordered<_> = urls
            .into_iter()
            .map(|url| {
                let task = FetchTask {
                    url,
                    headers: config.headers.clone(),
                    timeout: config.request_timeout,
                };
                async move {
                    // The semaphore lives for the whole batch and is never closed.
                    let _permit = semaphore.acquire().await.ok();
                    guarded_fetch(transport, session, task).await
                }
            })
            .collect();

        let mut sink = PageSink {
            ledger,
            adapter: adapter.as_ref(),
            target_dir,
            config,
            observer: observer.as_ref(),
        };
        let wait_key = batcher.response_wait_key().map(str::to_string);
        let mut continued = false;
        let mut completed = 0;
        let deadline = tokio::time::Instant::now() + sink.config.batch_timeout;

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((url, result))) => {
                    completed += 1;
                    match result {
                        Ok(response) => {
                            summary.pages_fetched += 1;
                            if let Some(key) = &wait_key {
                                // The next URL of a response-driven stream is only known now.
                                let next = response.header(key).map(str::to_string);
                                if next.is_none() {
                                    sink.observer.emit(RunEvent::ContinuationMissing {
                                        url: Some(url.clone()),
                                    });
                                }
                                batcher.advance(next.as_deref());
                                continued = true;
                            }
                            sink.handle_response(&response, state, summary);
                        }
                        Err(err) => sink.handle_fault(&url, err, summary),
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    let abandoned = pending.len();
                    summary.abandoned += abandoned as u64;
                    summary.record_fault(FaultKind::BatchTimeout, abandoned as u64);
                    sink.observer
                        .emit(RunEvent::BatchTimedOut { index, abandoned });
                    break;
                }
            }
        }
        drop(pending);

        if wait_key.is_some() && !continued {
            sink.observer
                .emit(RunEvent::ContinuationMissing { url: None });
            batcher.advance(None);
        }
        completed
    }
}

/// Per-batch view of what is needed to turn a completed task into ledger rows.
struct PageSink<'a, L> {
    ledger: &'a mut L,
    adapter: &'a dyn PageAdapter,
    target_dir: &'a Path,
    config: &'a RunConfig,
    observer: &'a dyn RunObserver,
}

impl<L: Ledger> PageSink<'_, L> {
    fn handle_fault(&mut self, url: &str, err: FetchError, summary: &mut RunSummary) {
        self.fault(url, err.kind, err.message, summary);
    }

    fn fault(&mut self, url: &str, kind: FaultKind, message: String, summary: &mut RunSummary) {
        summary.record_fault(kind, 1);
        self.observer.emit(RunEvent::PageFault {
            url: url.to_string(),
            kind,
            message,
        });
        if kind.records_error_row() {
            if let Err(err) = self.ledger.record_error(kind, url) {
                summary.record_fault(FaultKind::Persist, 1);
                self.observer.emit(RunEvent::PageFault {
                    url: url.to_string(),
                    kind: FaultKind::Persist,
                    message: format!("error row not recorded: {err}"),
                });
            }
        }
    }

    fn handle_response(
        &mut self,
        response: &FetchResponse,
        state: &mut RunState,
        summary: &mut RunSummary,
    ) {
        let url = response.url.as_str();
        let output = match self.adapter.adapt(response, self.target_dir) {
            Ok(output) => output,
            Err(err) => {
                self.fault(url, FaultKind::InvalidContent, err.to_string(), summary);
                return;
            }
        };
        let output = match &self.config.compression {
            Some(wrap) => wrap(output),
            None => output,
        };

        let rows = output.page().content().row_count();
        self.observer.emit(RunEvent::PageFetched {
            url: url.to_string(),
            status: response.status,
            rows,
        });
        *state = update(*state, PhaseMsg::PageObserved { rows });
        if rows == 0 {
            self.observer.emit(RunEvent::Depleted {
                url: url.to_string(),
            });
            return;
        }

        let artifact = match output.write(&self.config.format) {
            Ok(artifact) => artifact,
            Err(err @ OutputError::Shape { .. }) => {
                self.fault(url, FaultKind::InvalidContent, err.to_string(), summary);
                return;
            }
            Err(err) => {
                self.fault(url, FaultKind::Persist, err.to_string(), summary);
                return;
            }
        };
        summary.artifacts_written += 1;

        if let Err(err) = self.ledger.record_success(output.as_ref(), &artifact) {
            self.fault(
                url,
                FaultKind::Persist,
                format!("success row not recorded: {err}"),
                summary,
            );
            return;
        }
        self.observer.emit(RunEvent::ArtifactWritten {
            url: url.to_string(),
            name: artifact.name.clone(),
            size: artifact.size,
        });

        if self.config.ephemeral {
            match output.delete() {
                Ok(_) => {
                    summary.artifacts_deleted += 1;
                    self.observer.emit(RunEvent::ArtifactDeleted {
                        url: url.to_string(),
                        name: artifact.name,
                    });
                }
                Err(err) => self.fault(url, FaultKind::Persist, err.to_string(), summary),
            }
        }
    }
}
