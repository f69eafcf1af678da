/*
[INPUT]:  Inbound control objects ({"event": ...})
[OUTPUT]: Channel binding and consumer notices
[POS]:    WebSocket layer - control event interpretation
[UPDATE]: When Bitfinex adds info codes or control events
*/

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{BitfinexError, Result};
use crate::ws::dispatcher::StreamNotice;

const INFO_SERVER_RESTART: i64 = 20051;
const INFO_MAINTENANCE_STARTED: i64 = 20060;
const INFO_MAINTENANCE_ENDED: i64 = 20061;
const PLATFORM_STATUS_MAINTENANCE: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlEventKind {
    Info,
    Subscribed,
    Unsubscribed,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlatformInfo {
    pub status: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlEvent {
    pub event: ControlEventKind,
    #[serde(rename = "chanId", default)]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub platform: Option<PlatformInfo>,
}

/// Operational notice carried by an `info` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// 20051: websocket server is restarting, reconnect
    ServerRestart,
    /// 20060: maintenance starting, pause activity
    MaintenanceStarted,
    /// 20061: maintenance over, resubscribe
    MaintenanceEnded,
    /// Welcome message reported platform status 0
    PlatformMaintenance,
}

impl Advisory {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            INFO_SERVER_RESTART => Some(Advisory::ServerRestart),
            INFO_MAINTENANCE_STARTED => Some(Advisory::MaintenanceStarted),
            INFO_MAINTENANCE_ENDED => Some(Advisory::MaintenanceEnded),
            _ => None,
        }
    }

    pub fn code(self) -> Option<i64> {
        match self {
            Advisory::ServerRestart => Some(INFO_SERVER_RESTART),
            Advisory::MaintenanceStarted => Some(INFO_MAINTENANCE_STARTED),
            Advisory::MaintenanceEnded => Some(INFO_MAINTENANCE_ENDED),
            Advisory::PlatformMaintenance => None,
        }
    }

    /// The exchange asks clients to reconnect or resubscribe.
    pub fn suggests_resubscribe(self) -> bool {
        matches!(self, Advisory::ServerRestart | Advisory::MaintenanceEnded)
    }
}

/// Holds the channel id a subscription is bound to.
///
/// The id is written once, by a `subscribed` event, and never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelBinding {
    channel_id: Option<i64>,
}

impl ChannelBinding {
    pub fn channel_id(&self) -> Option<i64> {
        self.channel_id
    }

    pub fn is_bound(&self) -> bool {
        self.channel_id.is_some()
    }

    /// Apply one control event; returns the notice to surface, if any.
    pub fn apply(&mut self, event: &ControlEvent) -> Result<Option<StreamNotice>> {
        match event.event {
            ControlEventKind::Info => Ok(info_advisory(event).map(StreamNotice::Advisory)),
            ControlEventKind::Subscribed => {
                let channel_id = event.channel_id.ok_or(BitfinexError::MissingChannelId)?;
                if let Some(bound) = self.channel_id {
                    return Err(BitfinexError::ProtocolFormat(format!(
                        "subscription already bound to channel {bound}, got second ack for {channel_id}"
                    )));
                }
                self.channel_id = Some(channel_id);
                info!(channel_id, "ws subscription acknowledged");
                Ok(Some(StreamNotice::Subscribed { channel_id }))
            }
            ControlEventKind::Unsubscribed => {
                info!(channel_id = ?event.channel_id, "ws unsubscribed");
                Ok(Some(StreamNotice::Unsubscribed {
                    channel_id: event.channel_id,
                }))
            }
            ControlEventKind::Error => {
                let message = event
                    .msg
                    .clone()
                    .unwrap_or_else(|| "unspecified error".to_string());
                warn!(code = ?event.code, %message, "ws error event");
                Ok(Some(StreamNotice::UpstreamError {
                    code: event.code,
                    message,
                }))
            }
            ControlEventKind::Other => {
                debug!(?event, "ws control event ignored");
                Ok(None)
            }
        }
    }
}

fn info_advisory(event: &ControlEvent) -> Option<Advisory> {
    if let Some(version) = event.version {
        debug!(version, "ws server version");
    }

    if let Some(code) = event.code {
        let advisory = Advisory::from_code(code);
        match advisory {
            Some(advisory) => warn!(code, ?advisory, "ws info advisory"),
            None => debug!(code, "ws info code ignored"),
        }
        return advisory;
    }

    event
        .platform
        .as_ref()
        .filter(|platform| platform.status == PLATFORM_STATUS_MAINTENANCE)
        .map(|_| {
            warn!("ws platform in maintenance");
            Advisory::PlatformMaintenance
        })
}
