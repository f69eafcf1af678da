/*
[INPUT]:  StreamConfig, a channel decoder and a consumer event handler
[OUTPUT]: Running subscription task with cancel handle and status watch
[POS]:    WebSocket layer - connection lifecycle and receive loop
[UPDATE]: When lifecycle states or shutdown order change
*/

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::{BitfinexError, Result};
use crate::types::{SubscriptionKey, UnsubscribeRequest};
use crate::ws::connection::Connection;
use crate::ws::decoder::ChannelDecoder;
use crate::ws::dispatcher::{CloseReason, EventDispatcher, EventHandler, StreamNotice};
use crate::ws::session::{FeedSession, notice_for};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of one subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Subscribe request sent, no `subscribed` event yet
    AwaitingAck,
    Active { channel_id: i64 },
    Closed(CloseReason),
}

impl SubscriptionStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, SubscriptionStatus::Closed(_))
    }

    fn closed_reason(&self) -> CloseReason {
        match self {
            SubscriptionStatus::Closed(reason) => reason.clone(),
            _ => CloseReason::Cancelled,
        }
    }
}

/// Owner side of a running subscription; dropping it cancels the subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    key: SubscriptionKey,
    cancel: CancellationToken,
    status: watch::Receiver<SubscriptionStatus>,
    task: Option<JoinHandle<CloseReason>>,
}

impl SubscriptionHandle {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<SubscriptionStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status.borrow().is_closed()
            || self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the subscription and wait for its task to wind down.
    pub async fn unsubscribe(mut self) -> Result<CloseReason> {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return Ok(self.status().closed_reason());
        };
        task.await
            .map_err(|err| BitfinexError::Connection(format!("subscription task failed: {err}")))
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connect, send the subscribe request and start the receive task.
///
/// Connection and send failures are returned here; anything after that is
/// reported to `handler` as notices, ending with [`StreamNotice::Closed`].
pub async fn spawn_subscription<D, H>(
    config: &StreamConfig,
    decoder: D,
    handler: H,
) -> Result<SubscriptionHandle>
where
    D: ChannelDecoder,
    H: EventHandler,
{
    let key = decoder.subscription_key();
    let mut connection = Connection::connect(&config.url, config.connect_timeout).await?;
    connection.send(&decoder.subscribe_request()).await?;
    info!(subscription = %key, "ws subscribe sent");

    let cancel = CancellationToken::new();
    let (status_tx, status_rx) = watch::channel(SubscriptionStatus::AwaitingAck);
    let worker = SubscriptionWorker {
        connection,
        session: FeedSession::with_capacity(decoder, config.state_capacity),
        dispatcher: EventDispatcher::new(key.clone(), handler),
        status: status_tx,
    };
    let task = tokio::spawn(worker.run(cancel.clone()));

    Ok(SubscriptionHandle {
        key,
        cancel,
        status: status_rx,
        task: Some(task),
    })
}

/// Run a shutdown step that must not outlive `limit` when the peer stops reading.
async fn bounded<F>(limit: Duration, step: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::time::timeout(limit, step)
        .await
        .map_err(|_| BitfinexError::Timeout {
            duration: limit.as_secs(),
        })?
}

struct SubscriptionWorker<D: ChannelDecoder, H> {
    connection: Connection,
    session: FeedSession<D>,
    dispatcher: EventDispatcher<H>,
    status: watch::Sender<SubscriptionStatus>,
}

impl<D: ChannelDecoder, H: EventHandler> SubscriptionWorker<D, H> {
    async fn run(mut self, cancel: CancellationToken) -> CloseReason {
        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.send_unsubscribe().await;
                    break CloseReason::Cancelled;
                }
                received = self.connection.receive_frame() => {
                    match received {
                        Ok(Some(text)) => {
                            if let Err(err) = self.handle_frame(&text) {
                                break CloseReason::Failed(err.to_string());
                            }
                        }
                        Ok(None) => {
                            info!(subscription = %self.dispatcher.subscription(), "ws connection closed by server");
                            break CloseReason::Disconnected;
                        }
                        Err(err) if err.ends_stream() => {
                            warn!(subscription = %self.dispatcher.subscription(), error = %err, "ws receive failed");
                            break CloseReason::Failed(err.to_string());
                        }
                        Err(err) => self.dispatcher.notice(notice_for(err, "")),
                    }
                }
            }
        };

        self.finish(reason).await
    }

    /// Errors returned here end the loop; the rest become notices.
    fn handle_frame(&mut self, text: &str) -> Result<()> {
        match self.session.handle_frame(text, &mut self.dispatcher) {
            Ok(_) => {
                let awaiting_ack = matches!(*self.status.borrow(), SubscriptionStatus::AwaitingAck);
                if awaiting_ack && let Some(channel_id) = self.session.channel_id() {
                    self.status
                        .send_replace(SubscriptionStatus::Active { channel_id });
                }
                Ok(())
            }
            Err(err) if err.ends_stream() => {
                warn!(subscription = %self.dispatcher.subscription(), error = %err, "ws subscription unusable");
                Err(err)
            }
            Err(err) => {
                self.dispatcher.notice(notice_for(err, text));
                Ok(())
            }
        }
    }

    async fn send_unsubscribe(&mut self) {
        let Some(channel_id) = self.session.channel_id() else {
            debug!(subscription = %self.dispatcher.subscription(), "ws cancelled before ack");
            return;
        };
        let request = UnsubscribeRequest::new(channel_id);
        if let Err(err) = bounded(CLOSE_TIMEOUT, self.connection.send(&request)).await {
            debug!(channel_id, error = %err, "ws unsubscribe send failed");
        }
    }

    async fn finish(self, reason: CloseReason) -> CloseReason {
        let SubscriptionWorker {
            connection,
            mut dispatcher,
            status,
            ..
        } = self;

        if reason != CloseReason::Disconnected
            && let Err(err) = bounded(CLOSE_TIMEOUT, connection.close()).await
        {
            debug!(error = %err, "ws close failed");
        }

        info!(subscription = %dispatcher.subscription(), ?reason, "ws subscription closed");
        status.send_replace(SubscriptionStatus::Closed(reason.clone()));
        dispatcher.notice(StreamNotice::Closed(reason.clone()));
        reason
    }
}
