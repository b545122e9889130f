use std::fmt;
use std::str::FromStr;

/// Order books supported by the QuadrigaCX ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderBook {
    BtcCad,
    BtcUsd,
    EthCad,
    EthUsd,
}

impl OrderBook {
    pub const ALL: [OrderBook; 4] = [
        OrderBook::BtcCad,
        OrderBook::BtcUsd,
        OrderBook::EthCad,
        OrderBook::EthUsd,
    ];

    /// Identifier used by the ticker API, e.g. `eth_cad`.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderBook::BtcCad => "btc_cad",
            OrderBook::BtcUsd => "btc_usd",
            OrderBook::EthCad => "eth_cad",
            OrderBook::EthUsd => "eth_usd",
        }
    }

    /// Display name of the traded coin.
    pub fn coin(self) -> &'static str {
        match self {
            OrderBook::BtcCad | OrderBook::BtcUsd => "Bitcoin",
            OrderBook::EthCad | OrderBook::EthUsd => "Ether",
        }
    }

    /// Quote currency the price is denominated in.
    pub fn currency(self) -> &'static str {
        match self {
            OrderBook::BtcCad | OrderBook::EthCad => "CAD",
            OrderBook::BtcUsd | OrderBook::EthUsd => "USD",
        }
    }
}

impl fmt::Display for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderBook {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        OrderBook::ALL
            .into_iter()
            .find(|b| b.as_str() == lower)
            .ok_or_else(|| format!("invalid order book \"{s}\""))
    }
}

/// Direction of the price move since the last alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => f.write_str("up"),
            Trend::Down => f.write_str("down"),
        }
    }
}

/// Result of a single deadline-bounded ticker poll.
#[derive(Debug)]
pub enum PollOutcome {
    Success(f64),
    Timeout,
    Failure(anyhow::Error),
}
