/*
[INPUT]:  Error sources (HTTP, WebSocket, frame parsing, record decoding, input validation)
[OUTPUT]: Structured error types with retry and stream-termination hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::{ChannelKind, SymbolType};

/// Main error type for the Bitfinex connector
#[derive(Error, Debug)]
pub enum BitfinexError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Exchange reported an error (non-2xx REST response or `error` event)
    #[error("Upstream error (code {code}): {message}")]
    Upstream { code: i64, message: String },

    /// WebSocket transport failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport unreachable or unusable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection attempt did not complete in time
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },

    /// Frame shape matches none of the known classifications
    #[error("Protocol format error: {0}")]
    ProtocolFormat(String),

    /// `subscribed` acknowledgement without a `chanId`
    #[error("Subscription acknowledgement is missing the 'chanId' field")]
    MissingChannelId,

    /// Malformed symbol input
    #[error("Invalid symbol: {0}")]
    Validation(#[from] ValidationError),

    /// Unsupported configuration value
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    /// A single record could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A live subscription already exists for the symbol
    #[error("Already subscribed to {channel} for {symbol}")]
    AlreadySubscribed { channel: ChannelKind, symbol: String },

    /// No subscription exists for the symbol
    #[error("Not subscribed to {channel} for {symbol}")]
    NotSubscribed { channel: ChannelKind, symbol: String },
}

impl BitfinexError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BitfinexError::Http(_)
                | BitfinexError::WebSocket(_)
                | BitfinexError::Connection(_)
                | BitfinexError::Timeout { .. }
        )
    }

    /// Whether a receive loop must stop after this error.
    ///
    /// Transport failures and an unbindable subscription end the loop; frame
    /// and record level problems are reported and skipped.
    pub fn ends_stream(&self) -> bool {
        matches!(
            self,
            BitfinexError::WebSocket(_)
                | BitfinexError::Connection(_)
                | BitfinexError::Timeout { .. }
                | BitfinexError::MissingChannelId
        )
    }

    /// Build an upstream error from a non-2xx REST response.
    ///
    /// Bitfinex answers errors either as `["error", code, "message"]` or as
    /// `{"message": "..."}`; anything else is kept as raw text.
    pub fn upstream(status: StatusCode, body: &str) -> Self {
        BitfinexError::Upstream {
            code: i64::from(status.as_u16()),
            message: upstream_message(status, body),
        }
    }
}

fn upstream_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = value
            .as_array()
            .and_then(|items| items.get(2))
            .and_then(|message| message.as_str())
        {
            return message.to_string();
        }
        if let Some(message) = value.get("message").and_then(|message| message.as_str()) {
            return message.to_string();
        }
    }

    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string();
    }
    trimmed.to_string()
}

/// Symbol input rejected before any network activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    Empty,

    #[error("symbol is missing")]
    NullInput,

    #[error("symbol prefix must be 't' or 'f', got {prefix:?}")]
    BadPrefix { prefix: char },

    #[error("{symbol_type} symbols must be {expected} characters long, got {actual}")]
    BadLength {
        symbol_type: SymbolType,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no timeframe for a period of {seconds}s")]
    UnknownPeriod { seconds: u32 },

    #[error("unknown timeframe token {token:?}")]
    UnknownToken { token: String },
}

/// Failure to turn one raw record into a domain record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{channel} record needs at least {expected} fields, got {actual}")]
    TooFewFields {
        channel: ChannelKind,
        expected: usize,
        actual: usize,
    },

    #[error("field {field} is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field {field} is not a valid millisecond timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("field {index} is not a scalar value")]
    NonScalarField { index: usize },

    #[error("record is not an array")]
    NotARecord,
}

/// Result type alias for Bitfinex operations
pub type Result<T> = std::result::Result<T, BitfinexError>;
