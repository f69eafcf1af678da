/*
[INPUT]:  Endpoint URLs and timeouts chosen by the caller
[OUTPUT]: REST, stream and connector configuration with Bitfinex defaults
[POS]:    Configuration layer - shared by http, ws and the connector
[UPDATE]: When adding connection options or changing default endpoints
*/

use std::time::Duration;

/// Bitfinex public REST API root
pub const PUBLIC_REST_URL: &str = "https://api-pub.bitfinex.com/v2/";
/// Bitfinex public WebSocket endpoint
pub const PUBLIC_STREAM_URL: &str = "wss://api-pub.bitfinex.com/ws/2";
/// Records kept per subscription before the oldest are evicted
pub const DEFAULT_STATE_CAPACITY: usize = 10_000;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: PUBLIC_REST_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// WebSocket stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    /// Bound on the TCP/TLS/WebSocket handshake only; reads never time out.
    pub connect_timeout: Duration,
    /// Most records one subscription keeps for snapshot/update reconciliation
    pub state_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: PUBLIC_STREAM_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            state_capacity: DEFAULT_STATE_CAPACITY,
        }
    }
}

impl StreamConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_state_capacity(mut self, state_capacity: usize) -> Self {
        self.state_capacity = state_capacity;
        self
    }
}

/// Configuration for [`crate::BitfinexConnector`]
#[derive(Debug, Clone, Default)]
pub struct ConnectorConfig {
    pub client: ClientConfig,
    pub stream: StreamConfig,
}

impl ConnectorConfig {
    pub fn with_rest_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream.url = url.into();
        self
    }
}
