use crate::state::{PaginationState, StateError};

/// Lazy source of page URLs.
///
/// `next_url` returning `None` means the stream is exhausted. Counter streams never
/// return `None`; they rely on the orchestrator noticing an empty page.
pub trait PageStream: Send {
    fn next_url(&mut self) -> Option<String>;

    /// Feed a value observed outside the stream, usually taken from the previous response.
    /// `None` means no value was observed.
    fn advance(&mut self, value: Option<&str>);

    /// Header that carries the continuation value, for response-driven streams.
    fn response_wait_key(&self) -> Option<&str> {
        None
    }

    fn is_response_driven(&self) -> bool {
        self.response_wait_key().is_some()
    }
}

impl<S: PageStream + ?Sized> PageStream for Box<S> {
    fn next_url(&mut self) -> Option<String> {
        (**self).next_url()
    }

    fn advance(&mut self, value: Option<&str>) {
        (**self).advance(value);
    }

    fn response_wait_key(&self) -> Option<&str> {
        (**self).response_wait_key()
    }
}

/// A predetermined, finite list of URLs.
#[derive(Debug, Clone)]
pub struct StaticStream {
    urls: std::vec::IntoIter<String>,
}

impl StaticStream {
    pub fn new<I, U>(urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        Self {
            urls: urls.into_iter(),
        }
    }
}

impl PageStream for StaticStream {
    fn next_url(&mut self) -> Option<String> {
        self.urls.next()
    }

    fn advance(&mut self, _value: Option<&str>) {}
}

/// Integer page counter stored under the advancing key.
///
/// The first URL carries the seeded value (0 when the parameter is unset), each later
/// URL carries the previous value plus one. The stream ends once the counter would
/// overflow `i64`.
#[derive(Debug, Clone)]
pub struct CounterStream {
    state: PaginationState,
    key: String,
    next: Option<i64>,
}

impl CounterStream {
    pub fn new(state: PaginationState) -> Result<Self, StateError> {
        let key = state
            .advancing_key()
            .ok_or(StateError::MissingAdvancingKey)?
            .to_string();
        let next = match state.param(&key) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| StateError::NonIntegerCounter {
                    key: key.clone(),
                    value: raw.to_string(),
                })?,
            None => 0,
        };
        Ok(Self {
            state,
            key,
            next: Some(next),
        })
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }
}

impl PageStream for CounterStream {
    fn next_url(&mut self) -> Option<String> {
        let current = self.next?;
        self.state.set_param(&self.key, current.to_string());
        self.next = current.checked_add(1);
        Some(self.state.url())
    }

    /// An integer value overrides the next counter value; anything else is ignored.
    fn advance(&mut self, value: Option<&str>) {
        if let Some(next) = value.and_then(|raw| raw.trim().parse::<i64>().ok()) {
            self.next = Some(next);
        }
    }
}

/// Stream whose next URL is only known once the previous response has been seen.
///
/// Every call to `next_url` repeats the current URL until `advance` supplies a new value.
/// Advancing with `None` ends the stream.
#[derive(Debug, Clone)]
pub struct ResponseStream {
    state: PaginationState,
    wait_key: String,
    param_key: String,
    finished: bool,
}

impl ResponseStream {
    pub fn new(state: PaginationState) -> Result<Self, StateError> {
        let wait_key = state
            .response_wait_key()
            .ok_or(StateError::MissingWaitKey)?
            .to_string();
        let param_key = state
            .advancing_key()
            .map_or_else(|| wait_key.clone(), ToString::to_string);
        Ok(Self {
            state,
            wait_key,
            param_key,
            finished: false,
        })
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }
}

impl PageStream for ResponseStream {
    fn next_url(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        Some(self.state.url())
    }

    fn advance(&mut self, value: Option<&str>) {
        match value {
            Some(next) => self.state.set_param(&self.param_key, next),
            None => self.finished = true,
        }
    }

    fn response_wait_key(&self) -> Option<&str> {
        Some(&self.wait_key)
    }
}
