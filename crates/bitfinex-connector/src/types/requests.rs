/*
[INPUT]:  Subscription targets and REST history filters
[OUTPUT]: Outbound control messages and explicit query-string builders
[POS]:    Data layer - request types for the stream and REST endpoints
[UPDATE]: When API schema changes or new request fields added
*/

use serde::{Deserialize, Serialize};

use super::enums::{ChannelKind, RequestEvent, SortOrder};
use super::symbol::Symbol;
use super::timeframe::Timeframe;

/// `{"event":"subscribe","channel":...}` control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub event: RequestEvent,
    pub channel: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl SubscribeRequest {
    pub fn trades(symbol: &Symbol) -> Self {
        Self {
            event: RequestEvent::Subscribe,
            channel: ChannelKind::Trades,
            symbol: Some(symbol.canonical()),
            key: None,
        }
    }

    pub fn candles(symbol: &Symbol, timeframe: Timeframe) -> Self {
        Self {
            event: RequestEvent::Subscribe,
            channel: ChannelKind::Candles,
            symbol: None,
            key: Some(candle_key(symbol, timeframe)),
        }
    }
}

/// `{"event":"unsubscribe","chanId":...}` control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub event: RequestEvent,
    #[serde(rename = "chanId")]
    pub channel_id: i64,
}

impl UnsubscribeRequest {
    pub fn new(channel_id: i64) -> Self {
        Self {
            event: RequestEvent::Unsubscribe,
            channel_id,
        }
    }
}

/// Candle channel key, shared by the stream subscription and the REST path.
pub fn candle_key(symbol: &Symbol, timeframe: Timeframe) -> String {
    format!("trade:{}:{}", timeframe.token(), symbol)
}

/// Filters for the `/hist` REST endpoints.
///
/// Unset fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    /// Millisecond timestamp
    pub start: Option<i64>,
    /// Millisecond timestamp
    pub end: Option<i64>,
    pub sort: Option<SortOrder>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start(mut self, start_millis: i64) -> Self {
        self.start = Some(start_millis);
        self
    }

    pub fn with_end(mut self, end_millis: i64) -> Self {
        self.end = Some(end_millis);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(start) = self.start {
            pairs.push(("start", start.to_string()));
        }
        if let Some(end) = self.end {
            pairs.push(("end", end.to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_query_value().to_string()));
        }
        pairs
    }
}
