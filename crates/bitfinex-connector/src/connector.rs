/*
[INPUT]:  Pair strings, candle periods and history ranges from the caller
[OUTPUT]: REST history results and a single MarketEvent stream for live subscriptions
[POS]:    Connector layer - orchestrates the REST client and stream subscriptions
[UPDATE]: When adding connector operations or changing subscription bookkeeping
*/

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{ConnectorConfig, StreamConfig};
use crate::error::{BitfinexError, Result};
use crate::http::BitfinexClient;
use crate::types::{Candle, ChannelKind, HistoryQuery, Symbol, Timeframe, Trade};
use crate::ws::{
    CandleDecoder, CloseReason, MarketEvent, SubscriptionHandle, SubscriptionStatus, TradeDecoder,
    spawn_subscription,
};

/// Entry point for Bitfinex public market data.
///
/// Every live subscription feeds the same [`MarketEvent`] receiver; at most one
/// trades and one candles subscription exist per symbol.
#[derive(Debug)]
pub struct BitfinexConnector {
    client: BitfinexClient,
    stream: StreamConfig,
    trades: HashMap<String, SubscriptionHandle>,
    candles: HashMap<String, SubscriptionHandle>,
    event_tx: mpsc::UnboundedSender<MarketEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<MarketEvent>>,
}

impl BitfinexConnector {
    pub fn new() -> Result<Self> {
        Self::with_config(ConnectorConfig::default())
    }

    pub fn with_config(config: ConnectorConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            client: BitfinexClient::with_config(config.client)?,
            stream: config.stream,
            trades: HashMap::new(),
            candles: HashMap::new(),
            event_tx,
            event_rx: Some(event_rx),
        })
    }

    /// Take the event receiver; only the first call returns it.
    pub fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<MarketEvent>> {
        self.event_rx.take()
    }

    pub fn client(&self) -> &BitfinexClient {
        &self.client
    }

    /// Most recent trades for `pair`, at most `max_count`.
    pub async fn get_new_trades(&self, pair: &str, max_count: u32) -> Result<Vec<Trade>> {
        let symbol = Symbol::parse(pair)?;
        let query = HistoryQuery::new().with_limit(max_count);
        self.client.fetch_trades(&symbol, &query).await
    }

    /// Historical candles for `pair`; a `count` of zero means no limit.
    pub async fn get_candle_series(
        &self,
        pair: &str,
        period_secs: u32,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        count: Option<u32>,
    ) -> Result<Vec<Candle>> {
        let timeframe = Timeframe::from_period(period_secs)?;
        let symbol = Symbol::parse(pair)?;
        let query = HistoryQuery {
            limit: count.filter(|count| *count > 0),
            start: from.map(|from| from.timestamp_millis()),
            end: to.map(|to| to.timestamp_millis()),
            sort: None,
        };
        self.client.fetch_candles(&symbol, timeframe, &query).await
    }

    pub async fn subscribe_trades(&mut self, pair: &str) -> Result<()> {
        let symbol = Symbol::parse(pair)?;
        let key = symbol.canonical();
        ensure_vacant(&mut self.trades, ChannelKind::Trades, &key)?;

        let handle =
            spawn_subscription(&self.stream, TradeDecoder::new(symbol), self.event_tx.clone())
                .await?;
        info!(subscription = %handle.key(), "trades subscription started");
        self.trades.insert(key, handle);
        Ok(())
    }

    pub async fn unsubscribe_trades(&mut self, pair: &str) -> Result<CloseReason> {
        let symbol = Symbol::parse(pair)?;
        let handle = take_handle(&mut self.trades, ChannelKind::Trades, &symbol)?;
        handle.unsubscribe().await
    }

    pub async fn subscribe_candles(&mut self, pair: &str, period_secs: u32) -> Result<()> {
        let timeframe = Timeframe::from_period(period_secs)?;
        let symbol = Symbol::parse(pair)?;
        let key = symbol.canonical();
        ensure_vacant(&mut self.candles, ChannelKind::Candles, &key)?;

        let handle = spawn_subscription(
            &self.stream,
            CandleDecoder::new(symbol, timeframe),
            self.event_tx.clone(),
        )
        .await?;
        info!(subscription = %handle.key(), "candles subscription started");
        self.candles.insert(key, handle);
        Ok(())
    }

    pub async fn unsubscribe_candles(&mut self, pair: &str) -> Result<CloseReason> {
        let symbol = Symbol::parse(pair)?;
        let handle = take_handle(&mut self.candles, ChannelKind::Candles, &symbol)?;
        handle.unsubscribe().await
    }

    /// Status of the subscription for `pair`, if one was started.
    pub fn subscription_status(&self, channel: ChannelKind, pair: &str) -> Option<SubscriptionStatus> {
        let symbol = Symbol::parse(pair).ok()?;
        let subscriptions = match channel {
            ChannelKind::Trades => &self.trades,
            ChannelKind::Candles => &self.candles,
        };
        subscriptions
            .get(&symbol.canonical())
            .map(SubscriptionHandle::status)
    }

    /// Unsubscribe everything and wait for every task to end.
    pub async fn shutdown(&mut self) {
        let handles: Vec<SubscriptionHandle> = self
            .trades
            .drain()
            .chain(self.candles.drain())
            .map(|(_, handle)| handle)
            .collect();

        for handle in handles {
            let key = handle.key().clone();
            match handle.unsubscribe().await {
                Ok(reason) => debug!(subscription = %key, ?reason, "subscription stopped"),
                Err(err) => debug!(subscription = %key, error = %err, "subscription stop failed"),
            }
        }
    }
}

fn ensure_vacant(
    subscriptions: &mut HashMap<String, SubscriptionHandle>,
    channel: ChannelKind,
    key: &str,
) -> Result<()> {
    match subscriptions.get(key).map(SubscriptionHandle::is_finished) {
        Some(false) => Err(BitfinexError::AlreadySubscribed {
            channel,
            symbol: key.to_string(),
        }),
        Some(true) => {
            debug!(%channel, symbol = key, "replacing finished subscription");
            subscriptions.remove(key);
            Ok(())
        }
        None => Ok(()),
    }
}

fn take_handle(
    subscriptions: &mut HashMap<String, SubscriptionHandle>,
    channel: ChannelKind,
    symbol: &Symbol,
) -> Result<SubscriptionHandle> {
    let key = symbol.canonical();
    subscriptions
        .remove(&key)
        .ok_or(BitfinexError::NotSubscribed {
            channel,
            symbol: key,
        })
}
