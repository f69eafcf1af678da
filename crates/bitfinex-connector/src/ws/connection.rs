/*
[INPUT]:  Stream URL, connect timeout, outbound control messages
[OUTPUT]: Complete inbound text frames, reassembled from fragments
[POS]:    WebSocket layer - one transport connection per subscription
[UPDATE]: When transport options or message handling change
*/

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::error::{BitfinexError, Result};

/// Accumulates partial messages until the final fragment arrives
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk; returns the whole message once `end_of_message` is set.
    ///
    /// The buffer is reset after every complete message, valid or not.
    pub fn push(&mut self, chunk: &[u8], end_of_message: bool) -> Result<Option<String>> {
        self.buffer.extend_from_slice(chunk);
        if !end_of_message {
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.buffer);
        String::from_utf8(bytes).map(Some).map_err(|err| {
            BitfinexError::ProtocolFormat(format!("message is not valid UTF-8: {err}"))
        })
    }

    /// Bytes buffered for an unfinished message
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// One open WebSocket to the exchange
pub struct Connection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    assembler: FrameAssembler,
}

impl Connection {
    /// Open the socket; only the handshake is bounded by `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let (stream, response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| BitfinexError::Timeout {
                duration: timeout.as_secs(),
            })??;

        info!(url, status = %response.status(), "ws connected");

        Ok(Self {
            stream,
            assembler: FrameAssembler::new(),
        })
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let text = serde_json::to_string(message)?;
        debug!(message = %text, "ws send");
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    /// Next complete text frame; `None` once the peer closed the connection.
    pub async fn receive_frame(&mut self) -> Result<Option<String>> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(None);
            };

            let complete = match message? {
                WsMessage::Text(text) => self.assembler.push(text.as_bytes(), true)?,
                WsMessage::Binary(bytes) => self.assembler.push(&bytes, true)?,
                // tungstenite joins continuation frames on read; raw frames are buffered the same way
                WsMessage::Frame(frame) => {
                    let is_final = frame.header().is_final;
                    self.assembler.push(frame.payload().as_ref(), is_final)?
                }
                WsMessage::Close(close) => {
                    debug!(?close, "ws close frame received");
                    return Ok(None);
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) => None,
            };

            if let Some(text) = complete {
                return Ok(Some(text));
            }
        }
    }

    /// Send a close frame and drain until the peer acknowledges.
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        while let Some(message) = self.stream.next().await {
            if message.is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_are_joined_until_final() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(b"[17470,", false).expect("chunk"), None);
        assert_eq!(assembler.pending(), 7);
        assert_eq!(
            assembler.push(b"\"hb\"]", true).expect("chunk"),
            Some("[17470,\"hb\"]".to_string())
        );
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn invalid_utf8_is_rejected_and_buffer_reset() {
        let mut assembler = FrameAssembler::new();
        let err = assembler.push(&[0xff, 0xfe], true).expect_err("utf8");
        assert!(matches!(err, BitfinexError::ProtocolFormat(_)));
        assert_eq!(assembler.pending(), 0);

        assert_eq!(
            assembler.push(b"{}", true).expect("next message"),
            Some("{}".to_string())
        );
    }
}
