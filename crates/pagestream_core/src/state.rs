use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid base url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("pagination state has no advancing key")]
    MissingAdvancingKey,
    #[error("pagination state has no response wait key")]
    MissingWaitKey,
    #[error("parameter {key} holds non-integer value {value}")]
    NonIntegerCounter { key: String, value: String },
}

/// Base URL plus ordered query parameters that together describe the page to request.
///
/// Parameters keep insertion order so the same logical state always renders the same URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    base_url: Url,
    params: Vec<(String, String)>,
    advancing_key: Option<String>,
    response_wait_key: Option<String>,
}

impl PaginationState {
    /// Parse a resource URL. Its query string seeds the parameters and is stripped from the base.
    pub fn parse(resource: &str) -> Result<Self, StateError> {
        let mut base_url = Url::parse(resource).map_err(|err| StateError::InvalidUrl {
            url: resource.to_string(),
            reason: err.to_string(),
        })?;
        let params = base_url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        base_url.set_query(None);
        Ok(Self {
            base_url,
            params,
            advancing_key: None,
            response_wait_key: None,
        })
    }

    /// Replace every parameter, including those taken from the resource query.
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_param(key, value);
        self
    }

    pub fn with_advancing_key(mut self, key: impl Into<String>) -> Self {
        self.advancing_key = Some(key.into());
        self
    }

    pub fn with_response_wait_key(mut self, key: impl Into<String>) -> Self {
        self.response_wait_key = Some(key.into());
        self
    }

    /// Overwrite `key` in place, or append it when absent.
    pub fn set_param(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.params.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn advancing_key(&self) -> Option<&str> {
        self.advancing_key.as_deref()
    }

    pub fn response_wait_key(&self) -> Option<&str> {
        self.response_wait_key.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Render the current state as a URL string.
    pub fn url(&self) -> String {
        let mut url = self.base_url.clone();
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        url.to_string()
    }
}
