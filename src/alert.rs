use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use num_format::{Locale, ToFormattedString};

use crate::QUADRIGA_WEB_BASE;
use crate::types::{OrderBook, Trend};

/// Timestamp layout used in alert bodies, e.g. `2018-01-07 03:15 PM`.
const SINCE_FORMAT: &str = "%Y-%m-%d %I:%M %p";

/// Outcome of comparing the current price against the last alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub fire: bool,
    pub trend: Trend,
}

/// Subject and body of an alert email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

/// Decide whether the move from `last_price` to `cur_price` warrants an alert.
///
/// Fires when the move is at least `price_delta`, or when `max_idle` has
/// elapsed since `last_time` and the price moved at all. Equal prices are
/// reported as [`Trend::Up`].
pub fn should_alert(
    last_price: f64,
    last_time: DateTime<Utc>,
    cur_price: f64,
    cur_time: DateTime<Utc>,
    price_delta: f64,
    max_idle: std::time::Duration,
) -> Decision {
    let delta = (last_price - cur_price).abs();
    let idle_secs = (cur_time - last_time).num_milliseconds() as f64 / 1000.0;
    let idle_expired = idle_secs >= max_idle.as_secs_f64();

    let fire = delta >= price_delta || (idle_expired && delta > 0.0);
    let trend = if last_price > cur_price {
        Trend::Down
    } else {
        Trend::Up
    };

    Decision { fire, trend }
}

/// Format a price with thousands separators and two decimals: `1,234.50`.
pub fn format_price(price: f64) -> String {
    let cents = (price.abs() * 100.0).round() as u64;
    let sign = if price < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{sign}{}.{:02}",
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}

/// Link to the exchange page for the monitored market.
pub fn market_link(url_path: &str) -> String {
    format!("{QUADRIGA_WEB_BASE}{url_path}")
}

/// Compose the alert email for a price move.
///
/// `since` is the time of the previous alert, rendered in `timezone`.
pub fn compose_alert(
    book: OrderBook,
    trend: Trend,
    price: f64,
    since: DateTime<Utc>,
    timezone: Tz,
    url_path: &str,
) -> AlertMessage {
    let headline = format!(
        "{} went {trend} to ${} {}",
        book.coin(),
        format_price(price),
        book.currency()
    );
    let since = since.with_timezone(&timezone).format(SINCE_FORMAT);

    AlertMessage {
        subject: format!("{headline}!"),
        body: format!(
            "{headline} since {since}.\n\nFor more information visit: {}",
            market_link(url_path)
        ),
    }
}
