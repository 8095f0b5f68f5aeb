//! RON description of a harvest run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use pagestream_core::{CounterStream, PageStream, PaginationState, ResponseStream, StaticStream};
use pagestream_engine::{
    gzip_factory, header_map, ArtifactFormat, FormatOptions, JsonPageAdapter, RunConfig,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarvestConfig {
    pub resource: String,
    pub pagination: Pagination,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub output_dir: PathBuf,
    pub ledger_name: String,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub gzip: bool,
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub reuse_session: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum Pagination {
    /// Fixed URL list; an empty list fetches `resource` once.
    Static {
        #[serde(default)]
        urls: Vec<String>,
    },
    Counter {
        key: String,
    },
    ResponseDriven {
        #[serde(default)]
        key: Option<String>,
        wait_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum FormatConfig {
    Csv {
        #[serde(default = "default_delimiter")]
        delimiter: String,
        #[serde(default = "default_header")]
        header: bool,
    },
    Text,
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig::Csv {
            delimiter: default_delimiter(),
            header: default_header(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    20
}

fn default_batch_timeout() -> u64 {
    30
}

fn default_delimiter() -> String {
    "|".to_string()
}

fn default_header() -> bool {
    true
}

impl HarvestConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading run configuration {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing run configuration {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn page_stream(&self) -> anyhow::Result<Box<dyn PageStream>> {
        let stream: Box<dyn PageStream> = match &self.pagination {
            Pagination::Static { urls } if urls.is_empty() => {
                Box::new(StaticStream::new([self.resource.clone()]))
            }
            Pagination::Static { urls } => Box::new(StaticStream::new(urls.clone())),
            Pagination::Counter { key } => {
                let state = PaginationState::parse(&self.resource)?.with_advancing_key(key.as_str());
                Box::new(CounterStream::new(state)?)
            }
            Pagination::ResponseDriven { key, wait_key } => {
                let mut state = PaginationState::parse(&self.resource)?
                    .with_response_wait_key(wait_key.as_str());
                if let Some(key) = key {
                    state = state.with_advancing_key(key.as_str());
                }
                Box::new(ResponseStream::new(state)?)
            }
        };
        Ok(stream)
    }

    pub fn adapter(&self) -> JsonPageAdapter {
        match self.format {
            FormatConfig::Csv { .. } => JsonPageAdapter::new(ArtifactFormat::Csv),
            FormatConfig::Text => JsonPageAdapter::new(ArtifactFormat::Text),
        }
    }

    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let format = match &self.format {
            FormatConfig::Csv { delimiter, header } => FormatOptions {
                delimiter: delimiter_byte(delimiter)?,
                include_header: *header,
            },
            FormatConfig::Text => FormatOptions::default(),
        };
        Ok(RunConfig {
            headers: header_map(&self.headers)?,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
            batch_size: self.batch_size,
            max_concurrency: self.max_concurrency,
            ephemeral: self.ephemeral,
            compression: self.gzip.then(gzip_factory),
            format,
            reuse_session: self.reuse_session,
        })
    }
}

fn delimiter_byte(delimiter: &str) -> anyhow::Result<u8> {
    match delimiter.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => bail!("csv delimiter must be a single ASCII character, got {delimiter:?}"),
    }
}
