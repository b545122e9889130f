use chrono::{DateTime, Utc};

use crate::types::OrderBook;

/// Price and time of the last alert (or the seed poll, before any alert).
///
/// Owned by the monitor loop; never shared with the fetch task.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub order_book: OrderBook,
    pub last_price: f64,
    pub last_time: DateTime<Utc>,
}

impl Observation {
    pub fn new(order_book: OrderBook, price: f64, time: DateTime<Utc>) -> Self {
        Self {
            order_book,
            last_price: price,
            last_time: time,
        }
    }

    /// Record an alert at `price`, resetting the idle clock.
    pub fn record(&mut self, price: f64, time: DateTime<Utc>) {
        self.last_price = price;
        self.last_time = time;
    }

    /// Whether this observation belongs to another order book and must be
    /// re-seeded before prices can be compared.
    pub fn is_stale_for(&self, book: OrderBook) -> bool {
        self.order_book != book
    }
}
