//! Pagestream engine: transport, artifact outputs, ledger and the fetch orchestrator.
mod adapter;
mod compress;
mod content;
mod fetch;
mod ledger;
mod naming;
mod observer;
mod orchestrator;
mod output;
mod persist;
mod types;

pub use adapter::{AdaptError, ArtifactFormat, JsonPageAdapter, PageAdapter};
pub use compress::{gzip_factory, CompressionFactory, GzipOutput};
pub use content::Content;
pub use fetch::{FetchSettings, ReqwestTransport, Transport};
pub use ledger::{CsvLedger, Ledger, LedgerError, LedgerRow, LedgerRows};
pub use naming::{artifact_file_name, domain, stable_id};
pub use observer::{LogObserver, RunEvent, RunObserver};
pub use orchestrator::{
    header_map, ConfigError, FetchOrchestrator, OrchestratorBuilder, RunConfig, RunError,
};
pub use output::{Artifact, CsvOutput, FormatOptions, Output, OutputError, Page, TextOutput};
pub use persist::{ensure_output_dir, remove_if_present, ArtifactWriter, PersistError, PersistedFile};
pub use types::{FaultKind, FetchError, FetchResponse, FetchTask, RunSummary};
