use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::ticker::TickerSource;
use crate::types::{OrderBook, PollOutcome};

/// Builds a fresh ticker source. Called at startup and on every recycle.
pub type SourceFactory = Box<dyn Fn() -> Result<Arc<dyn TickerSource>> + Send + Sync>;

/// Runs ticker requests on a spawned task bounded by a deadline.
///
/// A request that misses its deadline is aborted and reported as
/// [`PollOutcome::Timeout`]; its result, if any, is discarded.
pub struct PriceFetcher {
    factory: SourceFactory,
    source: Arc<dyn TickerSource>,
    /// Polls issued since the source was last (re)built.
    polls: u64,
    /// Number of times the source has been rebuilt.
    generation: u64,
}

impl PriceFetcher {
    pub fn new(factory: SourceFactory) -> Result<Self> {
        let source = factory()?;
        Ok(Self {
            factory,
            source,
            polls: 0,
            generation: 0,
        })
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fetch the last price for `book`, waiting at most `timeout`.
    pub async fn fetch(&mut self, book: OrderBook, timeout: Duration) -> PollOutcome {
        self.polls += 1;
        let source = Arc::clone(&self.source);
        let mut handle = tokio::spawn(async move { source.last_price(book).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(price))) => PollOutcome::Success(price),
            Ok(Ok(Err(e))) => PollOutcome::Failure(e),
            Ok(Err(join_err)) => PollOutcome::Failure(anyhow!("ticker task failed: {join_err}")),
            Err(_) => {
                handle.abort();
                debug!("Abandoned {book} request after {}s", timeout.as_secs_f64());
                PollOutcome::Timeout
            }
        }
    }

    /// Rebuild the ticker source once `ttl` polls have been issued on it.
    ///
    /// Dropping the old source releases its connection pool. If the factory
    /// fails, the old source is kept and the counter is left untouched so the
    /// next call retries.
    pub fn recycle_if_due(&mut self, ttl: u64) {
        if self.polls < ttl {
            return;
        }
        match (self.factory)() {
            Ok(source) => {
                self.source = source;
                self.polls = 0;
                self.generation += 1;
                info!("Recycled ticker client (generation {})", self.generation);
            }
            Err(e) => {
                warn!("Failed to recycle ticker client: {e:#}");
            }
        }
    }
}
