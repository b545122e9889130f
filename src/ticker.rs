use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::QUADRIGA_API_BASE;
use crate::types::OrderBook;

/// Source of the most recent trade price for an order book.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn last_price(&self, book: OrderBook) -> Result<f64>;
}

/// Ticker payload returned by `GET /v2/ticker?book=<book>`.
///
/// QuadrigaCX serializes every numeric field as a string. Only the last
/// trade price is read.
#[derive(Debug, Deserialize)]
struct Ticker {
    #[serde(deserialize_with = "number_or_string")]
    last: f64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TickerResponse {
    Error { error: ApiError },
    Ticker(Ticker),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("non-numeric value \"{s}\""))),
        }
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    NumberOrString::deserialize(deserializer)?.into_f64()
}

/// Parse a ticker response body into the last trade price.
pub fn parse_last_price(body: &str) -> Result<f64> {
    let response: TickerResponse =
        serde_json::from_str(body).context("unexpected ticker response")?;
    let ticker = match response {
        TickerResponse::Ticker(ticker) => ticker,
        TickerResponse::Error { error } => match error.code {
            Some(code) => anyhow::bail!("ticker API error {code}: {}", error.message),
            None => anyhow::bail!("ticker API error: {}", error.message),
        },
    };
    if !ticker.last.is_finite() || ticker.last <= 0.0 {
        anyhow::bail!("ticker reported an invalid last price: {}", ticker.last);
    }
    Ok(ticker.last)
}

/// HTTP client for the QuadrigaCX public ticker.
pub struct QuadrigaClient {
    http: reqwest::Client,
    base_url: String,
}

impl QuadrigaClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(QUADRIGA_API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("quadriga-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the raw ticker body for an order book.
    pub async fn ticker_body(&self, book: OrderBook) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/ticker", self.base_url))
            .query(&[("book", book.as_str())])
            .send()
            .await
            .with_context(|| format!("ticker request for {book} failed"))?;
        let status = resp.status();
        let body = resp.text().await.context("failed to read ticker body")?;
        if !status.is_success() {
            anyhow::bail!("ticker request for {book} returned {status}: {body}");
        }
        Ok(body)
    }
}

#[async_trait]
impl TickerSource for QuadrigaClient {
    async fn last_price(&self, book: OrderBook) -> Result<f64> {
        let body = self.ticker_body(book).await?;
        let price = parse_last_price(&body)?;
        debug!("Fetched {book} last price {price}");
        Ok(price)
    }
}
