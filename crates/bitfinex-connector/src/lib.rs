/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Bitfinex connector crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod config;
pub mod connector;
pub mod error;
pub mod http;
pub mod types;
pub mod ws;

pub use config::{ClientConfig, ConnectorConfig, StreamConfig};
pub use connector::BitfinexConnector;
pub use error::{BitfinexError, ConfigurationError, DecodeError, Result, ValidationError};

// Re-export commonly used types from http
pub use http::BitfinexClient;

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    Advisory,
    CloseReason,
    EventHandler,
    MarketEvent,
    StreamNotice,
    SubscriptionHandle,
    SubscriptionStatus,
    spawn_subscription,
};
