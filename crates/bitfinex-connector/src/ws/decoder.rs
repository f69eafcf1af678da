/*
[INPUT]:  Positional field lists from stream frames or REST rows
[OUTPUT]: Trade and Candle records with exact decimals
[POS]:    WebSocket layer - per-channel record decoding (also used by REST)
[UPDATE]: When Bitfinex changes record layouts or new channels are added
*/

use std::fmt::Debug;
use std::hash::Hash;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::DecodeError;
use crate::types::{
    Candle, ChannelKind, Side, SubscribeRequest, SubscriptionKey, Symbol, Timeframe, Trade,
};
use crate::ws::dispatcher::Routable;

/// Record kept in a subscription's keyed state
pub trait StreamRecord: Routable + Clone + PartialEq + Debug + Send + 'static {
    type Key: Eq + Hash + Clone + Debug + Send + 'static;

    fn key(&self) -> Self::Key;
}

impl StreamRecord for Trade {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl StreamRecord for Candle {
    type Key = DateTime<Utc>;

    fn key(&self) -> DateTime<Utc> {
        self.open_time
    }
}

/// Turns one channel's raw field lists into domain records
pub trait ChannelDecoder: Send + 'static {
    type Record: StreamRecord;

    fn subscription_key(&self) -> SubscriptionKey;

    fn subscribe_request(&self) -> SubscribeRequest;

    fn decode(&self, fields: &[String]) -> Result<Self::Record, DecodeError>;
}

/// `[ID, MTS, AMOUNT, PRICE]` for pairs, `[ID, MTS, AMOUNT, ...]` for funding
#[derive(Debug, Clone)]
pub struct TradeDecoder {
    symbol: Symbol,
}

impl TradeDecoder {
    pub const PAIR_FIELDS: usize = 4;
    pub const FUNDING_FIELDS: usize = 3;

    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn required_fields(&self) -> usize {
        if self.symbol.is_trading_pair() {
            Self::PAIR_FIELDS
        } else {
            Self::FUNDING_FIELDS
        }
    }
}

impl ChannelDecoder for TradeDecoder {
    type Record = Trade;

    fn subscription_key(&self) -> SubscriptionKey {
        SubscriptionKey::trades(self.symbol.clone())
    }

    fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::trades(&self.symbol)
    }

    fn decode(&self, fields: &[String]) -> Result<Trade, DecodeError> {
        require_fields(ChannelKind::Trades, fields, self.required_fields())?;

        let timestamp = parse_millis("MTS", &fields[1])?;
        let signed_amount = parse_decimal("AMOUNT", &fields[2])?;
        let price = if self.symbol.is_trading_pair() {
            Some(parse_decimal("PRICE", &fields[3])?)
        } else {
            None
        };

        Ok(Trade {
            id: fields[0].clone(),
            pair: self.symbol.label().to_string(),
            timestamp,
            side: Side::from_signed_amount(signed_amount),
            amount: signed_amount.abs(),
            price,
        })
    }
}

/// `[MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]`
#[derive(Debug, Clone)]
pub struct CandleDecoder {
    symbol: Symbol,
    timeframe: Timeframe,
}

impl CandleDecoder {
    pub const FIELDS: usize = 6;

    pub fn new(symbol: Symbol, timeframe: Timeframe) -> Self {
        Self { symbol, timeframe }
    }
}

impl ChannelDecoder for CandleDecoder {
    type Record = Candle;

    fn subscription_key(&self) -> SubscriptionKey {
        SubscriptionKey::candles(self.symbol.clone(), self.timeframe)
    }

    fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::candles(&self.symbol, self.timeframe)
    }

    fn decode(&self, fields: &[String]) -> Result<Candle, DecodeError> {
        require_fields(ChannelKind::Candles, fields, Self::FIELDS)?;

        Ok(Candle {
            pair: self.symbol.label().to_string(),
            open_time: parse_millis("MTS", &fields[0])?,
            open: parse_decimal("OPEN", &fields[1])?,
            close: parse_decimal("CLOSE", &fields[2])?,
            high: parse_decimal("HIGH", &fields[3])?,
            low: parse_decimal("LOW", &fields[4])?,
            total_volume: parse_decimal("VOLUME", &fields[5])?,
        })
    }
}

/// Flatten a JSON record into the text of each scalar field.
///
/// Numbers keep their wire spelling; `null` becomes an empty string.
pub fn record_fields(values: &[Value]) -> Result<Vec<String>, DecodeError> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            Value::Null => Ok(String::new()),
            Value::Array(_) | Value::Object(_) => Err(DecodeError::NonScalarField { index }),
        })
        .collect()
}

/// Decode a JSON value that should hold one record.
pub fn decode_value<D: ChannelDecoder + ?Sized>(
    decoder: &D,
    value: &Value,
) -> Result<D::Record, DecodeError> {
    let Value::Array(values) = value else {
        return Err(DecodeError::NotARecord);
    };
    decoder.decode(&record_fields(values)?)
}

fn require_fields(
    channel: ChannelKind,
    fields: &[String],
    expected: usize,
) -> Result<(), DecodeError> {
    if fields.len() < expected {
        return Err(DecodeError::TooFewFields {
            channel,
            expected,
            actual: fields.len(),
        });
    }
    Ok(())
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, DecodeError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| DecodeError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

fn parse_millis(field: &'static str, raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| DecodeError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}
