use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::alert::{compose_alert, format_price, should_alert};
use crate::config::Config;
use crate::fetcher::PriceFetcher;
use crate::notifier::{Email, Mailer, notify};
use crate::state::Observation;
use crate::types::{PollOutcome, Trend};

/// When the config file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReloadPolicy {
    /// Re-read the config file before every poll so live edits apply.
    /// A file that fails to load skips the tick and keeps the last good config.
    #[default]
    EveryTick,
    /// Read the config file once at startup.
    Startup,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Config reload failed; nothing was polled.
    ConfigSkipped,
    /// The ticker request missed its deadline.
    TimedOut,
    /// The ticker request failed.
    Failed,
    /// First price for a newly configured order book; no comparison made.
    Seeded { price: f64 },
    /// Price polled, no alert warranted.
    Quiet { price: f64 },
    /// Alert fired. `delivered` is false if the mail send failed.
    Alerted {
        price: f64,
        trend: Trend,
        delivered: bool,
    },
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The poll → decide → notify loop.
pub struct Monitor {
    config: Config,
    config_path: PathBuf,
    reload: ReloadPolicy,
    fetcher: PriceFetcher,
    mailer: Arc<dyn Mailer>,
    observation: Observation,
    clock: Clock,
}

impl Monitor {
    /// Seed the observation with one price and return a ready monitor.
    ///
    /// Fails if the seed poll times out or errors.
    pub async fn start(
        config: Config,
        config_path: PathBuf,
        reload: ReloadPolicy,
        fetcher: PriceFetcher,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        Self::start_with_clock(config, config_path, reload, fetcher, mailer, Box::new(Utc::now))
            .await
    }

    async fn start_with_clock(
        config: Config,
        config_path: PathBuf,
        reload: ReloadPolicy,
        mut fetcher: PriceFetcher,
        mailer: Arc<dyn Mailer>,
        clock: Clock,
    ) -> Result<Self> {
        let book = config.order_book;
        info!("Seeding {book} price...");
        let price = match fetcher.fetch(book, config.timeout).await {
            PollOutcome::Success(price) => price,
            PollOutcome::Timeout => anyhow::bail!(
                "timed out after {}s fetching initial {book} price",
                config.timeout.as_secs()
            ),
            PollOutcome::Failure(e) => {
                return Err(e.context(format!("failed to fetch initial {book} price")));
            }
        };
        info!(
            "Initial {} price: ${} {}",
            book.coin(),
            format_price(price),
            book.currency()
        );

        let observation = Observation::new(book, price, clock());
        Ok(Self {
            config,
            config_path,
            reload,
            fetcher,
            mailer,
            observation,
            clock,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    pub fn fetcher(&self) -> &PriceFetcher {
        &self.fetcher
    }

    /// Run one poll cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.reload == ReloadPolicy::EveryTick {
            match Config::load(&self.config_path) {
                Ok(config) => {
                    if config.order_book != self.config.order_book {
                        info!(
                            "Order book changed from {} to {}",
                            self.config.order_book, config.order_book
                        );
                    }
                    self.config = config;
                }
                Err(e) => {
                    error!("Failed to load config: {e}");
                    return TickOutcome::ConfigSkipped;
                }
            }
        }

        self.fetcher.recycle_if_due(self.config.process_ttl);

        let book = self.config.order_book;
        let price = match self.fetcher.fetch(book, self.config.timeout).await {
            PollOutcome::Success(price) => price,
            PollOutcome::Timeout => {
                warn!(
                    "Timeout while polling QuadrigaCX ({book}, {}s)",
                    self.config.timeout.as_secs()
                );
                return TickOutcome::TimedOut;
            }
            PollOutcome::Failure(e) => {
                warn!("Failed to poll QuadrigaCX: {e:#}");
                return TickOutcome::Failed;
            }
        };
        let now = (self.clock)();

        debug!(
            "Last trade price for {}: ${} {}",
            book.coin().to_lowercase(),
            format_price(price),
            book.currency()
        );

        if self.observation.is_stale_for(book) {
            self.observation = Observation::new(book, price, now);
            return TickOutcome::Seeded { price };
        }

        let decision = should_alert(
            self.observation.last_price,
            self.observation.last_time,
            price,
            now,
            self.config.price_delta,
            self.config.max_idle,
        );
        if !decision.fire {
            return TickOutcome::Quiet { price };
        }

        let message = compose_alert(
            book,
            decision.trend,
            price,
            self.observation.last_time,
            self.config.timezone,
            &self.config.url_path,
        );
        let email = Email {
            from: self.config.sender_email.clone(),
            to: self.config.to_emails.clone(),
            subject: message.subject,
            body: message.body,
        };
        let delivered = notify(self.mailer.as_ref(), &email, &self.config.sender_password).await;
        self.observation.record(price, now);

        TickOutcome::Alerted {
            price,
            trend: decision.trend,
            delivered,
        }
    }

    /// Poll forever, sleeping `poll_wait` between ticks, until Ctrl+C.
    pub async fn run(mut self) {
        info!(
            "Entering polling loop (book: {}, interval: {}s, reload: {:?}). Press Ctrl+C to stop.",
            self.config.order_book,
            self.config.poll_wait.as_secs(),
            self.reload
        );

        loop {
            let poll_wait = self.config.poll_wait;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(poll_wait) => {
                    let outcome = self.tick().await;
                    debug!("Tick outcome: {outcome:?}");
                }
            }
        }
    }
}
