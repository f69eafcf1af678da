/*
[INPUT]:  Complete text frames of one subscription
[OUTPUT]: Channel binding, reconciled state, dispatched records and notices
[POS]:    WebSocket layer - per-subscription frame pipeline
[UPDATE]: When frame handling order or update rules change
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info, trace};

use crate::config::DEFAULT_STATE_CAPACITY;
use crate::error::{BitfinexError, Result};
use crate::types::SubscriptionKey;
use crate::ws::control::ChannelBinding;
use crate::ws::decoder::{ChannelDecoder, StreamRecord, decode_value, record_fields};
use crate::ws::dispatcher::{EventDispatcher, EventHandler, StreamNotice};
use crate::ws::frame::{self, Frame, UpdateKind};
use crate::ws::reconciler::SnapshotReconciler;

const UNBOUND_LOG_LIMIT: usize = 3;
const REJECT_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static UNBOUND_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static REJECT_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// What one frame did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Control,
    Heartbeat,
    /// Frame for another channel, or data before the ack
    Ignored,
    Snapshot { accepted: usize, rejected: usize },
    Update { replaced: bool, dispatched: bool },
}

/// State of one subscription: binding, decoder and reconciled records.
///
/// Frames must be fed in receive order; nothing here is shared across tasks.
#[derive(Debug)]
pub struct FeedSession<D: ChannelDecoder> {
    decoder: D,
    binding: ChannelBinding,
    state: SnapshotReconciler<D::Record>,
}

impl<D: ChannelDecoder> FeedSession<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_capacity(decoder, DEFAULT_STATE_CAPACITY)
    }

    /// Session whose reconciled state holds at most `capacity` records.
    pub fn with_capacity(decoder: D, capacity: usize) -> Self {
        Self {
            decoder,
            binding: ChannelBinding::default(),
            state: SnapshotReconciler::with_capacity(capacity),
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn subscription_key(&self) -> SubscriptionKey {
        self.decoder.subscription_key()
    }

    pub fn channel_id(&self) -> Option<i64> {
        self.binding.channel_id()
    }

    pub fn state(&self) -> &SnapshotReconciler<D::Record> {
        &self.state
    }

    /// Run one frame through classification, decoding, reconciliation and dispatch.
    ///
    /// Errors leave the reconciled state untouched; the caller decides whether
    /// they end the stream (see [`BitfinexError::ends_stream`]).
    pub fn handle_frame<H: EventHandler>(
        &mut self,
        text: &str,
        dispatcher: &mut EventDispatcher<H>,
    ) -> Result<FrameOutcome> {
        match frame::classify(text, self.binding.channel_id())? {
            Frame::Control(event) => {
                if let Some(notice) = self.binding.apply(&event)? {
                    dispatcher.notice(notice);
                }
                Ok(FrameOutcome::Control)
            }
            Frame::Heartbeat { channel_id } => {
                trace!(channel_id, "ws heartbeat");
                Ok(FrameOutcome::Heartbeat)
            }
            Frame::Unbound { channel_id } => {
                log_unbound_once(channel_id, self.binding.channel_id(), text);
                Ok(FrameOutcome::Ignored)
            }
            Frame::Snapshot {
                channel_id,
                records,
            } => Ok(self.apply_snapshot(channel_id, &records, dispatcher)),
            Frame::Update { kind, fields, .. } => self.apply_update(kind, &fields, dispatcher),
        }
    }

    fn apply_snapshot<H: EventHandler>(
        &mut self,
        channel_id: i64,
        records: &[serde_json::Value],
        dispatcher: &mut EventDispatcher<H>,
    ) -> FrameOutcome {
        let mut accepted = Vec::with_capacity(records.len());
        let mut rejected = 0;

        for value in records {
            match decode_value(&self.decoder, value) {
                Ok(record) => accepted.push(record),
                Err(err) => {
                    rejected += 1;
                    log_rejected_once(&err.to_string(), &value.to_string());
                    dispatcher.notice(StreamNotice::RecordRejected(err));
                }
            }
        }

        let accepted_count = accepted.len();
        self.state.replace_all(accepted);
        info!(
            channel_id,
            subscription = %dispatcher.subscription(),
            accepted = accepted_count,
            rejected,
            "ws snapshot loaded"
        );

        FrameOutcome::Snapshot {
            accepted: accepted_count,
            rejected,
        }
    }

    fn apply_update<H: EventHandler>(
        &mut self,
        kind: UpdateKind,
        fields: &[serde_json::Value],
        dispatcher: &mut EventDispatcher<H>,
    ) -> Result<FrameOutcome> {
        let fields = record_fields(fields)?;
        let record = self.decoder.decode(&fields)?;

        // A confirmation that repeats the stored record carries nothing new
        if kind == UpdateKind::Confirmation && self.state.get(&record.key()) == Some(&record) {
            return Ok(FrameOutcome::Update {
                replaced: true,
                dispatched: false,
            });
        }

        let replaced = self.state.upsert(record.clone());
        dispatcher.dispatch(record);
        Ok(FrameOutcome::Update {
            replaced,
            dispatched: true,
        })
    }
}

/// Turn a non-fatal frame error into the notice the consumer sees.
pub(crate) fn notice_for(err: BitfinexError, raw: &str) -> StreamNotice {
    match err {
        BitfinexError::Decode(err) => {
            log_rejected_once(&err.to_string(), raw);
            StreamNotice::RecordRejected(err)
        }
        other => {
            log_rejected_once(&other.to_string(), raw);
            StreamNotice::MalformedFrame(other.to_string())
        }
    }
}

fn log_unbound_once(channel_id: i64, bound: Option<i64>, raw: &str) {
    let count = UNBOUND_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < UNBOUND_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = UNBOUND_LOG_LIMIT,
            channel_id,
            bound = ?bound,
            "ws frame for unbound channel ignored"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = UNBOUND_LOG_LIMIT,
            channel_id,
            message = %preview,
            "ws frame for unbound channel ignored"
        );
    }
}

fn log_rejected_once(error: &str, raw: &str) {
    let count = REJECT_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < REJECT_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = REJECT_LOG_LIMIT,
            error,
            bytes = raw.len(),
            "ws frame rejected"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = REJECT_LOG_LIMIT,
            error,
            message = %preview,
            "ws frame rejected"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::types::{Candle, Symbol, Timeframe, Trade};
    use crate::ws::decoder::{CandleDecoder, TradeDecoder};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl EventHandler for Recorder {
        fn on_buy_trade(&mut self, trade: Trade) {
            self.events.push(format!("buy:{}", trade.id));
        }

        fn on_sell_trade(&mut self, trade: Trade) {
            self.events.push(format!("sell:{}", trade.id));
        }

        fn on_candle(&mut self, candle: Candle) {
            self.events.push(format!("candle:{}:{}", candle.open_time.timestamp_millis(), candle.close));
        }

        fn on_notice(&mut self, _subscription: &SubscriptionKey, notice: StreamNotice) {
            self.events.push(format!("notice:{notice:?}"));
        }
    }

    fn trades_session() -> (FeedSession<TradeDecoder>, EventDispatcher<Recorder>) {
        let decoder = TradeDecoder::new(Symbol::parse("tBTCUSD").expect("symbol"));
        let dispatcher = EventDispatcher::new(decoder.subscription_key(), Recorder::default());
        (FeedSession::new(decoder), dispatcher)
    }

    fn candles_session() -> (FeedSession<CandleDecoder>, EventDispatcher<Recorder>) {
        let decoder = CandleDecoder::new(
            Symbol::parse("tBTCUSD").expect("symbol"),
            Timeframe::from_period(60).expect("timeframe"),
        );
        let dispatcher = EventDispatcher::new(decoder.subscription_key(), Recorder::default());
        (FeedSession::new(decoder), dispatcher)
    }

    const ACK: &str = r#"{"event":"subscribed","channel":"trades","chanId":17470,"symbol":"tBTCUSD"}"#;

    #[test]
    fn data_before_ack_is_ignored() {
        let (mut session, mut dispatcher) = trades_session();
        let outcome = session
            .handle_frame(r#"[17470,[1,1700000000000,0.5,50000]]"#, &mut dispatcher)
            .expect("frame");

        assert_eq!(outcome, FrameOutcome::Ignored);
        assert!(session.state().is_empty());
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[test]
    fn snapshot_fills_state_without_dispatching() {
        let (mut session, mut dispatcher) = trades_session();
        session.handle_frame(ACK, &mut dispatcher).expect("ack");

        let outcome = session
            .handle_frame(
                r#"[17470,[[1,1700000000000,0.5,50000],[2,1700000000001,-0.25,50001]]]"#,
                &mut dispatcher,
            )
            .expect("snapshot");

        assert_eq!(
            outcome,
            FrameOutcome::Snapshot {
                accepted: 2,
                rejected: 0
            }
        );
        assert_eq!(session.state().len(), 2);
        assert_eq!(dispatcher.dispatched(), 0);
        assert_eq!(
            dispatcher.handler().events,
            vec!["notice:Subscribed { channel_id: 17470 }"]
        );
    }

    #[test]
    fn snapshot_skips_bad_records_and_keeps_the_rest() {
        let (mut session, mut dispatcher) = trades_session();
        session.handle_frame(ACK, &mut dispatcher).expect("ack");

        let outcome = session
            .handle_frame(
                r#"[17470,[[1,1700000000000,0.5,50000],[2,1700000000001],[3,1700000000002,1,2]]]"#,
                &mut dispatcher,
            )
            .expect("snapshot");

        assert_eq!(
            outcome,
            FrameOutcome::Snapshot {
                accepted: 2,
                rejected: 1
            }
        );
        assert!(session.state().contains(&"3".to_string()));
        assert!(dispatcher.handler().events[1].starts_with("notice:RecordRejected"));
    }

    #[test]
    fn updates_dispatch_in_receive_order() {
        let (mut session, mut dispatcher) = trades_session();
        session.handle_frame(ACK, &mut dispatcher).expect("ack");
        session.handle_frame("[17470,[]]", &mut dispatcher).expect("snapshot");

        for frame in [
            r#"[17470,[10,1700000000000,-1,50000]]"#,
            r#"[17470,"te",[11,1700000000001,2,50001]]"#,
            r#"[17470,[12,1700000000002,-3,50002]]"#,
        ] {
            session.handle_frame(frame, &mut dispatcher).expect("update");
        }

        assert_eq!(dispatcher.dispatched(), 3);
        assert_eq!(
            dispatcher.handler().events[1..],
            ["sell:10", "buy:11", "sell:12"]
        );
    }

    #[test]
    fn confirmation_of_known_trade_is_not_redispatched() {
        let (mut session, mut dispatcher) = trades_session();
        session.handle_frame(ACK, &mut dispatcher).expect("ack");

        session
            .handle_frame(r#"[17470,"te",[11,1700000000001,2,50001]]"#, &mut dispatcher)
            .expect("te");
        let outcome = session
            .handle_frame(r#"[17470,"tu",[11,1700000000001,2,50001]]"#, &mut dispatcher)
            .expect("tu");
        assert_eq!(
            outcome,
            FrameOutcome::Update {
                replaced: true,
                dispatched: false
            }
        );

        let outcome = session
            .handle_frame(r#"[17470,"tu",[12,1700000000002,2,50001]]"#, &mut dispatcher)
            .expect("tu");
        assert_eq!(
            outcome,
            FrameOutcome::Update {
                replaced: false,
                dispatched: true
            }
        );
        assert_eq!(dispatcher.dispatched(), 2);
    }

    #[test]
    fn changed_confirmation_is_dispatched() {
        let (mut session, mut dispatcher) = trades_session();
        session.handle_frame(ACK, &mut dispatcher).expect("ack");
        session
            .handle_frame(r#"[17470,[[1,1700000000000,0.5,50000]]]"#, &mut dispatcher)
            .expect("snapshot");

        let outcome = session
            .handle_frame(r#"[17470,"tu",[1,1700000000000,0.75,51000]]"#, &mut dispatcher)
            .expect("tu");

        assert_eq!(
            outcome,
            FrameOutcome::Update {
                replaced: true,
                dispatched: true
            }
        );
        assert_eq!(dispatcher.dispatched(), 1);
        assert_eq!(dispatcher.handler().events.last().map(String::as_str), Some("buy:1"));
        let stored = session.state().get(&"1".to_string()).expect("trade");
        assert_eq!(stored.price, Some(rust_decimal::Decimal::from(51000)));
    }

    #[test]
    fn trade_state_stays_within_capacity() {
        let decoder = TradeDecoder::new(Symbol::parse("tBTCUSD").expect("symbol"));
        let mut dispatcher = EventDispatcher::new(decoder.subscription_key(), Recorder::default());
        let mut session = FeedSession::with_capacity(decoder, 100);
        session.handle_frame(ACK, &mut dispatcher).expect("ack");
        session
            .handle_frame(r#"[17470,[[1,1700000000000,0.5,50000]]]"#, &mut dispatcher)
            .expect("snapshot");

        for id in 2..=2_000 {
            let frame = format!("[17470,\"te\",[{id},1700000000000,0.5,50000]]");
            session.handle_frame(&frame, &mut dispatcher).expect("update");
        }

        assert_eq!(session.state().len(), 100);
        assert_eq!(dispatcher.dispatched(), 1_999);
        assert!(!session.state().contains(&"1".to_string()));
        assert!(session.state().contains(&"2000".to_string()));
    }

    #[test]
    fn candle_update_replaces_same_open_time() {
        let (mut session, mut dispatcher) = candles_session();
        session
            .handle_frame(r#"{"event":"subscribed","channel":"candles","chanId":9,"key":"trade:1m:tBTCUSD"}"#, &mut dispatcher)
            .expect("ack");
        session
            .handle_frame(r#"[9,[[1700000000000,1,2,3,0.5,10]]]"#, &mut dispatcher)
            .expect("snapshot");

        let outcome = session
            .handle_frame(r#"[9,[1700000000000,1,2.5,3,0.5,11]]"#, &mut dispatcher)
            .expect("update");

        assert_eq!(
            outcome,
            FrameOutcome::Update {
                replaced: true,
                dispatched: true
            }
        );
        assert_eq!(session.state().len(), 1);
        assert_eq!(
            dispatcher.handler().events.last().map(String::as_str),
            Some("candle:1700000000000:2.5")
        );
    }

    #[test]
    fn bad_update_leaves_state_untouched() {
        let (mut session, mut dispatcher) = trades_session();
        session.handle_frame(ACK, &mut dispatcher).expect("ack");
        session
            .handle_frame(r#"[17470,[[1,1700000000000,0.5,50000]]]"#, &mut dispatcher)
            .expect("snapshot");

        let err = session
            .handle_frame(r#"[17470,[2,1700000000000,"x",50000]]"#, &mut dispatcher)
            .expect_err("bad amount");
        assert!(matches!(
            err,
            BitfinexError::Decode(DecodeError::InvalidNumber { field: "AMOUNT", .. })
        ));
        assert_eq!(session.state().len(), 1);
        assert_eq!(dispatcher.dispatched(), 0);

        let notice = notice_for(err, "raw");
        assert!(matches!(notice, StreamNotice::RecordRejected(_)));
    }

    #[test]
    fn heartbeat_changes_nothing() {
        let (mut session, mut dispatcher) = trades_session();
        session.handle_frame(ACK, &mut dispatcher).expect("ack");
        assert_eq!(
            session.handle_frame(r#"[17470,"hb"]"#, &mut dispatcher).expect("hb"),
            FrameOutcome::Heartbeat
        );
        assert!(session.state().is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_log("abc", 10), "abc");
        assert_eq!(truncate_for_log("ééé", 3), "é...");
    }
}
