/*
[INPUT]:  Stream configuration, channel decoders and consumer handlers
[OUTPUT]: Reconciled trade and candle updates delivered in receive order
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod connection;
pub mod control;
pub mod decoder;
pub mod dispatcher;
pub mod frame;
pub mod reconciler;
pub mod session;
pub mod subscription;

pub use connection::{Connection, FrameAssembler};
pub use control::{Advisory, ChannelBinding, ControlEvent, ControlEventKind};
pub use decoder::{CandleDecoder, ChannelDecoder, StreamRecord, TradeDecoder};
pub use dispatcher::{CloseReason, EventDispatcher, EventHandler, MarketEvent, StreamNotice};
pub use frame::{Frame, UpdateKind, classify};
pub use reconciler::SnapshotReconciler;
pub use session::{FeedSession, FrameOutcome};
pub use subscription::{SubscriptionHandle, SubscriptionStatus, spawn_subscription};
