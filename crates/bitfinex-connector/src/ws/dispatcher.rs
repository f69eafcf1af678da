/*
[INPUT]:  Decoded update records and stream notices from one subscription
[OUTPUT]: Synchronous consumer callbacks, or MarketEvents on a channel
[POS]:    WebSocket layer - consumer notification in receive order
[UPDATE]: When adding event kinds or changing routing rules
*/

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::DecodeError;
use crate::types::{Candle, Side, SubscriptionKey, Trade};
use crate::ws::control::Advisory;

/// Why a subscription's receive loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Unsubscribed or dropped by the consumer
    Cancelled,
    /// Server closed the connection
    Disconnected,
    /// Transport or protocol failure
    Failed(String),
}

/// Non-record information about a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNotice {
    Subscribed { channel_id: i64 },
    Advisory(Advisory),
    Unsubscribed { channel_id: Option<i64> },
    UpstreamError { code: Option<i64>, message: String },
    /// One record was skipped; other records in the frame were kept
    RecordRejected(DecodeError),
    /// A frame did not match any known shape and was skipped
    MalformedFrame(String),
    Closed(CloseReason),
}

/// Everything a connector delivers to its consumer, in receive order per subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    BuyTrade(Trade),
    SellTrade(Trade),
    Candle(Candle),
    Notice {
        subscription: SubscriptionKey,
        notice: StreamNotice,
    },
}

/// Consumer callbacks, invoked on the subscription's receive task.
///
/// A slow callback stalls its subscription; hand heavy work elsewhere.
pub trait EventHandler: Send + 'static {
    fn on_buy_trade(&mut self, _trade: Trade) {}

    fn on_sell_trade(&mut self, _trade: Trade) {}

    fn on_candle(&mut self, _candle: Candle) {}

    fn on_notice(&mut self, _subscription: &SubscriptionKey, _notice: StreamNotice) {}
}

impl EventHandler for mpsc::UnboundedSender<MarketEvent> {
    fn on_buy_trade(&mut self, trade: Trade) {
        forward(self, MarketEvent::BuyTrade(trade));
    }

    fn on_sell_trade(&mut self, trade: Trade) {
        forward(self, MarketEvent::SellTrade(trade));
    }

    fn on_candle(&mut self, candle: Candle) {
        forward(self, MarketEvent::Candle(candle));
    }

    fn on_notice(&mut self, subscription: &SubscriptionKey, notice: StreamNotice) {
        forward(
            self,
            MarketEvent::Notice {
                subscription: subscription.clone(),
                notice,
            },
        );
    }
}

fn forward(sender: &mpsc::UnboundedSender<MarketEvent>, event: MarketEvent) {
    if sender.send(event).is_err() {
        trace!("market event receiver dropped");
    }
}

/// Picks the handler callback for a record
pub trait Routable {
    fn route<H: EventHandler + ?Sized>(self, handler: &mut H);
}

impl Routable for Trade {
    fn route<H: EventHandler + ?Sized>(self, handler: &mut H) {
        match self.side {
            Side::Buy => handler.on_buy_trade(self),
            Side::Sell => handler.on_sell_trade(self),
        }
    }
}

impl Routable for Candle {
    fn route<H: EventHandler + ?Sized>(self, handler: &mut H) {
        handler.on_candle(self);
    }
}

/// Delivers one subscription's updates and notices to its handler
#[derive(Debug)]
pub struct EventDispatcher<H> {
    subscription: SubscriptionKey,
    handler: H,
    dispatched: u64,
}

impl<H: EventHandler> EventDispatcher<H> {
    pub fn new(subscription: SubscriptionKey, handler: H) -> Self {
        Self {
            subscription,
            handler,
            dispatched: 0,
        }
    }

    pub fn subscription(&self) -> &SubscriptionKey {
        &self.subscription
    }

    pub fn dispatch<R: Routable>(&mut self, record: R) {
        self.dispatched += 1;
        record.route(&mut self.handler);
    }

    pub fn notice(&mut self, notice: StreamNotice) {
        self.handler.on_notice(&self.subscription, notice);
    }

    /// Number of records handed to the consumer so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}
