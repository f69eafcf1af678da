/*
[INPUT]:  Complete text frames from the stream connection
[OUTPUT]: Frame classification (control, heartbeat, snapshot, update, unbound)
[POS]:    WebSocket layer - depth-based frame classification
[UPDATE]: When Bitfinex changes frame shapes or adds frame tags
*/

use serde_json::Value;

use crate::error::{BitfinexError, Result};
use crate::ws::control::ControlEvent;

/// Payload of a keep-alive frame: `[chanId, "hb"]`
pub const HEARTBEAT: &str = "hb";
/// Tag of a trade execution update: `[chanId, "te", [...]]`
pub const TRADE_EXECUTED: &str = "te";
/// Tag of a trade confirmation update: `[chanId, "tu", [...]]`
pub const TRADE_UPDATED: &str = "tu";

/// How an update should reach the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Untagged or `te` update, always dispatched
    Execution,
    /// `tu` update, dispatched only for records not seen before
    Confirmation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Control(ControlEvent),
    Heartbeat { channel_id: i64 },
    /// `[chanId, [[...], [...]]]`; each element should be one record
    Snapshot { channel_id: i64, records: Vec<Value> },
    /// `[chanId, [...]]` or `[chanId, tag, [...]]`
    Update {
        channel_id: i64,
        kind: UpdateKind,
        fields: Vec<Value>,
    },
    /// Data for a channel this subscription is not bound to
    Unbound { channel_id: i64 },
}

/// Classify a complete frame by its first structural token and nesting depth.
///
/// `bound` is the subscription's channel id; data frames for any other
/// channel (including all data before the subscription ack) come back as
/// [`Frame::Unbound`].
pub fn classify(text: &str, bound: Option<i64>) -> Result<Frame> {
    match text.trim_start().chars().next() {
        Some('{') => Ok(Frame::Control(serde_json::from_str(text)?)),
        Some('[') => classify_array(serde_json::from_str(text)?, bound),
        Some(other) => Err(BitfinexError::ProtocolFormat(format!(
            "frame starts with {other:?}, expected an object or an array"
        ))),
        None => Err(BitfinexError::ProtocolFormat("empty frame".to_string())),
    }
}

fn classify_array(items: Vec<Value>, bound: Option<i64>) -> Result<Frame> {
    let mut items = items.into_iter();
    let channel_id = items.next().and_then(|value| value.as_i64()).ok_or_else(|| {
        BitfinexError::ProtocolFormat("data frame must start with an integer channel id".to_string())
    })?;

    if bound != Some(channel_id) {
        return Ok(Frame::Unbound { channel_id });
    }

    match (items.next(), items.next()) {
        (Some(Value::String(tag)), None) if tag == HEARTBEAT => Ok(Frame::Heartbeat { channel_id }),
        (Some(Value::String(tag)), Some(Value::Array(fields))) if is_flat(&fields) => {
            let kind = match tag.as_str() {
                TRADE_EXECUTED => UpdateKind::Execution,
                TRADE_UPDATED => UpdateKind::Confirmation,
                _ => {
                    return Err(BitfinexError::ProtocolFormat(format!(
                        "unknown update tag {tag:?} on channel {channel_id}"
                    )));
                }
            };
            Ok(Frame::Update {
                channel_id,
                kind,
                fields,
            })
        }
        (Some(Value::Array(payload)), None) => {
            if payload.is_empty() || payload.first().is_some_and(Value::is_array) {
                Ok(Frame::Snapshot {
                    channel_id,
                    records: payload,
                })
            } else {
                Ok(Frame::Update {
                    channel_id,
                    kind: UpdateKind::Execution,
                    fields: payload,
                })
            }
        }
        _ => Err(BitfinexError::ProtocolFormat(format!(
            "unrecognized data frame shape on channel {channel_id}"
        ))),
    }
}

fn is_flat(fields: &[Value]) -> bool {
    !fields.is_empty() && !fields.first().is_some_and(Value::is_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::control::ControlEventKind;
    use serde_json::json;

    #[test]
    fn object_frames_are_control_events() {
        let frame = classify(r#"  {"event":"info","version":2}"#, None).expect("classify");
        match frame {
            Frame::Control(event) => {
                assert_eq!(event.event, ControlEventKind::Info);
                assert_eq!(event.version, Some(2));
            }
            other => panic!("expected control frame, got {other:?}"),
        }
    }

    #[test]
    fn data_before_binding_is_unbound() {
        let frame = classify(r#"[17470,[["1",1700000000000,0.5,50000]]]"#, None).expect("classify");
        assert_eq!(frame, Frame::Unbound { channel_id: 17470 });

        let frame = classify(r#"[1,"hb"]"#, Some(2)).expect("classify");
        assert_eq!(frame, Frame::Unbound { channel_id: 1 });
    }

    #[test]
    fn heartbeat_is_its_own_kind() {
        assert_eq!(
            classify(r#"[17470,"hb"]"#, Some(17470)).expect("classify"),
            Frame::Heartbeat { channel_id: 17470 }
        );
    }

    #[test]
    fn three_levels_is_a_snapshot() {
        let frame = classify(r#"[5,[[1,1700000000000,0.5,50000],[2,1700000000001,-1,50001]]]"#, Some(5))
            .expect("classify");
        match frame {
            Frame::Snapshot { channel_id, records } => {
                assert_eq!(channel_id, 5);
                assert_eq!(records.len(), 2);
                assert_eq!(records[1], json!([2, 1700000000001_i64, -1, 50001]));
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn empty_payload_is_an_empty_snapshot() {
        assert_eq!(
            classify("[5,[]]", Some(5)).expect("classify"),
            Frame::Snapshot {
                channel_id: 5,
                records: Vec::new()
            }
        );
    }

    #[test]
    fn two_levels_is_an_update() {
        let frame = classify(r#"[5,[1700000000000,1,2,3,4,5]]"#, Some(5)).expect("classify");
        assert!(matches!(
            frame,
            Frame::Update { channel_id: 5, kind: UpdateKind::Execution, ref fields } if fields.len() == 6
        ));
    }

    #[test]
    fn tagged_trade_updates() {
        let frame = classify(r#"[5,"te",[9,1700000000000,0.1,50000]]"#, Some(5)).expect("classify");
        assert!(matches!(frame, Frame::Update { kind: UpdateKind::Execution, .. }));

        let frame = classify(r#"[5,"tu",[9,1700000000000,0.1,50000]]"#, Some(5)).expect("classify");
        assert!(matches!(frame, Frame::Update { kind: UpdateKind::Confirmation, .. }));
    }

    #[test]
    fn unknown_shapes_are_protocol_errors() {
        for raw in [
            r#""hello""#,
            "",
            r#"["abc",[1,2]]"#,
            r#"[5,"xx",[1,2]]"#,
            r#"[5,42]"#,
            r#"[5]"#,
            r#"[5,"hb","extra"]"#,
        ] {
            let err = classify(raw, Some(5)).expect_err(raw);
            assert!(matches!(err, BitfinexError::ProtocolFormat(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn invalid_json_is_a_serialization_error() {
        let err = classify("[5,[1,2", Some(5)).expect_err("truncated");
        assert!(matches!(err, BitfinexError::Serialization(_)));
    }
}
