/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bitfinex-connector tests

#![allow(dead_code)]

use std::time::Duration;

use bitfinex_connector::{MarketEvent, StreamConfig};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use wiremock::MockServer;

pub const WAIT: Duration = Duration::from_secs(5);

pub const TRADES_ACK: &str =
    r#"{"event":"subscribed","channel":"trades","chanId":17470,"symbol":"tBTCUSD","pair":"BTCUSD"}"#;
pub const CANDLES_ACK: &str =
    r#"{"event":"subscribed","channel":"candles","chanId":343351,"key":"trade:1m:tBTCUSD"}"#;
pub const WELCOME: &str = r#"{"event":"info","version":2,"serverId":"test","platform":{"status":1}}"#;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

enum ServerAction {
    Send(String),
    /// One text message split across a Text frame and Continue frames
    SendFragments(Vec<String>),
    Close,
}

/// Single-connection WebSocket server scripted by the test
pub struct MockStreamServer {
    url: String,
    actions: mpsc::UnboundedSender<ServerAction>,
    received: mpsc::UnboundedReceiver<String>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (actions, mut actions_rx) = mpsc::unbounded_channel();
        let (received_tx, received) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = accept_async(tcp).await else {
                return;
            };

            loop {
                tokio::select! {
                    action = actions_rx.recv() => match action {
                        Some(ServerAction::Send(text)) => {
                            if ws.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerAction::SendFragments(parts)) => {
                            let last = parts.len().saturating_sub(1);
                            let mut failed = false;
                            for (index, part) in parts.into_iter().enumerate() {
                                let opcode = if index == 0 {
                                    OpCode::Data(Data::Text)
                                } else {
                                    OpCode::Data(Data::Continue)
                                };
                                let frame = Frame::message(part.into_bytes(), opcode, index == last);
                                if ws.send(Message::Frame(frame)).await.is_err() {
                                    failed = true;
                                    break;
                                }
                            }
                            if failed {
                                break;
                            }
                        }
                        Some(ServerAction::Close) | None => {
                            let _ = ws.close(None).await;
                            break;
                        }
                    },
                    incoming = ws.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = received_tx.send(text.to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    },
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            actions,
            received,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::default().with_url(self.url.clone())
    }

    pub fn send(&self, text: &str) {
        self.actions
            .send(ServerAction::Send(text.to_string()))
            .expect("server task alive");
    }

    /// Send one text message as several wire fragments
    pub fn send_fragments(&self, parts: &[&str]) {
        let parts = parts.iter().map(|part| part.to_string()).collect();
        self.actions
            .send(ServerAction::SendFragments(parts))
            .expect("server task alive");
    }

    pub fn close(&self) {
        let _ = self.actions.send(ServerAction::Close);
    }

    /// Next text message the client sent, parsed as JSON
    pub async fn next_received(&mut self) -> serde_json::Value {
        let text = tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("client message in time")
            .expect("connection open");
        serde_json::from_str(&text).expect("client sent JSON")
    }
}

/// Next event from a connector or subscription channel
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<MarketEvent>) -> MarketEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("event in time")
        .expect("event channel open")
}

/// A port with nothing listening on it
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{addr}")
}
