use std::path::Path;

use thiserror::Error;

use crate::content::Content;
use crate::output::{CsvOutput, Output, Page, TextOutput};
use crate::FetchResponse;

#[derive(Debug, Error)]
pub enum AdaptError {
    #[error("body of {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Other(String),
}

/// Turns a response into the output that will persist it.
pub trait PageAdapter: Send + Sync {
    fn adapt(&self, response: &FetchResponse, target_dir: &Path)
        -> Result<Box<dyn Output>, AdaptError>;
}

impl<F> PageAdapter for F
where
    F: Fn(&FetchResponse, &Path) -> Result<Box<dyn Output>, AdaptError> + Send + Sync,
{
    fn adapt(
        &self,
        response: &FetchResponse,
        target_dir: &Path,
    ) -> Result<Box<dyn Output>, AdaptError> {
        self(response, target_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactFormat {
    #[default]
    Csv,
    Text,
}

/// Decodes JSON bodies into row-shaped content.
///
/// Non-success statuses produce empty content, which ends counter and response-driven runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPageAdapter {
    format: ArtifactFormat,
}

impl JsonPageAdapter {
    pub fn new(format: ArtifactFormat) -> Self {
        Self { format }
    }
}

impl PageAdapter for JsonPageAdapter {
    fn adapt(
        &self,
        response: &FetchResponse,
        target_dir: &Path,
    ) -> Result<Box<dyn Output>, AdaptError> {
        let content = if response.is_success() {
            Content::from_slice(&response.body).map_err(|source| AdaptError::Decode {
                url: response.url.clone(),
                source,
            })?
        } else {
            Content::Empty
        };
        let page = Page::new(content, &response.url, response.headers.clone(), target_dir);
        Ok(match self.format {
            ArtifactFormat::Csv => Box::new(CsvOutput::new(page)),
            ArtifactFormat::Text => Box::new(TextOutput::new(page)),
        })
    }
}
