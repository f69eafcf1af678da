/*
[INPUT]:  Decoded Bitfinex trade and candle records
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - domain records delivered to consumers
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{ChannelKind, Side};
use super::symbol::Symbol;
use super::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Only trading pairs carry a price; funding trades leave it empty.
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub pair: String,
    pub open_time: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_volume: Decimal,
}

/// Identity of one stream subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub channel: ChannelKind,
    pub symbol: Symbol,
    pub timeframe: Option<Timeframe>,
}

impl SubscriptionKey {
    pub fn trades(symbol: Symbol) -> Self {
        Self {
            channel: ChannelKind::Trades,
            symbol,
            timeframe: None,
        }
    }

    pub fn candles(symbol: Symbol, timeframe: Timeframe) -> Self {
        Self {
            channel: ChannelKind::Candles,
            symbol,
            timeframe: Some(timeframe),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timeframe {
            Some(timeframe) => write!(f, "{}:{}:{}", self.channel, timeframe, self.symbol),
            None => write!(f, "{}:{}", self.channel, self.symbol),
        }
    }
}
