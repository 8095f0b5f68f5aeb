use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::output::{FormatOptions, Output, OutputError, Page};

/// Wraps an output before it is encoded; the wrapper is what gets persisted and recorded.
pub type CompressionFactory = Arc<dyn Fn(Box<dyn Output>) -> Box<dyn Output> + Send + Sync>;

pub fn gzip_factory() -> CompressionFactory {
    Arc::new(|inner| Box::new(GzipOutput::new(inner)))
}

/// Gzip decorator: `{id}.{inner extension}.gz` holding the inner buffer compressed.
pub struct GzipOutput {
    inner: Box<dyn Output>,
}

impl GzipOutput {
    pub fn new(inner: Box<dyn Output>) -> Self {
        Self { inner }
    }
}

impl Output for GzipOutput {
    fn page(&self) -> &Page {
        self.inner.page()
    }

    fn extension(&self) -> String {
        format!("{}.gz", self.inner.extension())
    }

    fn encode(&self, options: &FormatOptions) -> Result<Vec<u8>, OutputError> {
        let raw = self.inner.encode(options)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&raw)
            .map_err(|err| OutputError::Encode(err.to_string()))?;
        encoder
            .finish()
            .map_err(|err| OutputError::Encode(err.to_string()))
    }
}
