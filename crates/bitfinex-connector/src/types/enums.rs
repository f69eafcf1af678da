/*
[INPUT]:  Bitfinex public API vocabulary and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Side of a trade from its signed wire amount; positive amounts are buys.
    pub fn from_signed_amount(amount: rust_decimal::Decimal) -> Self {
        if amount > rust_decimal::Decimal::ZERO {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    TradingPair,
    FundingCurrency,
}

impl SymbolType {
    pub fn prefix(self) -> char {
        match self {
            SymbolType::TradingPair => 't',
            SymbolType::FundingCurrency => 'f',
        }
    }

    /// Length of the raw symbol string, prefix included.
    pub fn raw_length(self) -> usize {
        match self {
            SymbolType::TradingPair => 7,
            SymbolType::FundingCurrency => 4,
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolType::TradingPair => f.write_str("trading pair"),
            SymbolType::FundingCurrency => f.write_str("funding currency"),
        }
    }
}

/// Public stream channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Trades,
    Candles,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Trades => "trades",
            ChannelKind::Candles => "candles",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `event` field of outbound control messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestEvent {
    Subscribe,
    Unsubscribe,
}

/// Ordering of REST history results by timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_query_value(self) -> &'static str {
        match self {
            SortOrder::Ascending => "1",
            SortOrder::Descending => "-1",
        }
    }
}
