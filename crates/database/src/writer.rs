//! Chunked bulk writes with a per-chunk linear backoff.

use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};

/// Splits a batch into chunks of at most `chunk_size` items and writes them in
/// order. A failing chunk gets up to `max_retries` more attempts; the wait
/// before retry `n` is `n * 2 * backoff_unit`. The first chunk that still fails
/// after its retries aborts the batch, and the chunks after it are never
/// attempted.
#[derive(Debug, Clone)]
pub struct ChunkedRetryWriter {
    chunk_size: usize,
    max_retries: u32,
    backoff_unit: Duration,
}

impl ChunkedRetryWriter {
    pub fn new(chunk_size: usize, max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_retries,
            backoff_unit,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks a batch of `len` items is split into.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Wait before the given retry (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff_unit * retry.saturating_mul(2)
    }

    /// Writes every chunk of `items` through `write`, returning the number of
    /// chunks written. On failure the error of the last attempt is returned.
    pub async fn write_all<T, F, Fut, E>(&self, items: &[T], mut write: F) -> Result<usize, E>
    where
        T: Clone,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let total = self.chunk_count(items.len());
        for (index, chunk) in items.chunks(self.chunk_size).enumerate() {
            self.write_chunk(chunk, &mut write).await.inspect_err(|e| {
                tracing::error!(
                    chunk = index + 1,
                    total,
                    error = %e,
                    "Chunk write failed after all retries."
                );
            })?;
        }
        Ok(total)
    }

    /// Writes a single record with the same retry policy as one chunk.
    pub async fn write_one<T, F, Fut, E>(&self, item: &T, write: F) -> Result<(), E>
    where
        T: Clone,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.write_all(std::slice::from_ref(item), write).await.map(|_| ())
    }

    async fn write_chunk<T, F, Fut, E>(&self, chunk: &[T], write: &mut F) -> Result<(), E>
    where
        T: Clone,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let mut retry = 0;
        loop {
            match write(chunk.to_vec()).await {
                Ok(()) => return Ok(()),
                Err(e) if retry < self.max_retries => {
                    retry += 1;
                    let delay = self.backoff_for(retry);
                    tracing::warn!(
                        retry,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %e,
                        "Chunk write failed, backing off."
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
