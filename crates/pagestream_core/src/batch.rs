use thiserror::Error;

use crate::stream::PageStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

/// URLs dispatched together. Order is dispatch order, not completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: u64,
    urls: Vec<String>,
}

impl Batch {
    pub fn new(index: u64, urls: Vec<String>) -> Self {
        Self { index, urls }
    }

    /// Zero-based position of this batch in the run.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

/// Groups a stream's URLs into bounded batches.
///
/// Response-driven streams always get batches of one URL, whatever size was requested.
#[derive(Debug)]
pub struct Batcher<S> {
    stream: S,
    batch_size: usize,
    next_index: u64,
    exhausted: bool,
}

impl<S: PageStream> Batcher<S> {
    pub fn new(stream: S, batch_size: usize) -> Result<Self, BatchError> {
        if batch_size == 0 {
            return Err(BatchError::ZeroBatchSize);
        }
        let batch_size = if stream.is_response_driven() {
            1
        } else {
            batch_size
        };
        Ok(Self {
            stream,
            batch_size,
            next_index: 0,
            exhausted: false,
        })
    }

    /// Effective batch size after the response-driven override.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_response_driven(&self) -> bool {
        self.stream.is_response_driven()
    }

    pub fn response_wait_key(&self) -> Option<&str> {
        self.stream.response_wait_key()
    }

    /// Forward a continuation value to the wrapped stream.
    pub fn advance(&mut self, value: Option<&str>) {
        self.stream.advance(value);
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn next_batch(&mut self) -> Option<Batch> {
        if self.exhausted {
            return None;
        }
        let mut urls = Vec::with_capacity(self.batch_size);
        while urls.len() < self.batch_size {
            match self.stream.next_url() {
                Some(url) => urls.push(url),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        if urls.is_empty() {
            return None;
        }
        let batch = Batch::new(self.next_index, urls);
        self.next_index += 1;
        Some(batch)
    }
}

impl<S: PageStream> Iterator for Batcher<S> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
