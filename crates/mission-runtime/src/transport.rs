//! Streaming channel abstraction.
//!
//! A [`Transport`] is a pair of tokio channels: inbound events in strict
//! receipt order, and outbound frames drained by a single writer so that
//! writes never interleave. [`WebSocketConnector`] backs it with a real
//! WebSocket; [`Transport::pair`] gives an in-memory peer for tests and
//! embedding.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use mission_core::error::{MissionError, Result};
use mission_core::frame::OutboundFrame;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// Capacity of each direction of a transport.
const CHANNEL_CAPACITY: usize = 256;

// ── TransportEvent ────────────────────────────────────────────────────────────

/// Something that happened on the inbound side of the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame, exactly as received.
    Frame(String),
    /// The peer closed the channel.
    Closed,
    /// The channel broke.
    Error(String),
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// The client side of an open streaming channel.
pub struct Transport {
    pub inbound: mpsc::Receiver<TransportEvent>,
    pub outbound: mpsc::Sender<OutboundFrame>,
}

impl Transport {
    /// An in-memory transport and the peer that drives it.
    pub fn pair() -> (Transport, TransportPeer) {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (frame_tx, frame_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Transport {
                inbound: event_rx,
                outbound: frame_tx,
            },
            TransportPeer {
                events: event_tx,
                sent: frame_rx,
            },
        )
    }
}

/// The remote end of an in-memory [`Transport`].
pub struct TransportPeer {
    events: mpsc::Sender<TransportEvent>,
    sent: mpsc::Receiver<OutboundFrame>,
}

impl TransportPeer {
    /// Deliver a raw text frame. Returns `false` once the client has gone.
    pub async fn push(&self, raw: impl Into<String>) -> bool {
        self.events
            .send(TransportEvent::Frame(raw.into()))
            .await
            .is_ok()
    }

    pub async fn close(&self) {
        let _ = self.events.send(TransportEvent::Closed).await;
    }

    pub async fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Error(reason.into())).await;
    }

    /// Next frame the client transmitted, or `None` once it hung up.
    pub async fn next_sent(&mut self) -> Option<OutboundFrame> {
        self.sent.recv().await
    }

    /// A frame already transmitted, without waiting.
    pub fn try_next_sent(&mut self) -> Option<OutboundFrame> {
        self.sent.try_recv().ok()
    }
}

// ── Connector ─────────────────────────────────────────────────────────────────

/// Opens streaming channels to the orchestrator.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> impl Future<Output = Result<Transport>> + Send;
}

/// [`Connector`] for `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        let url = normalise_url(url);
        debug!(%url, "connecting to orchestrator");

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| MissionError::Transport(format!("failed to connect to {url}: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (frame_tx, mut frame_rx) = mpsc::channel::<OutboundFrame>(CHANNEL_CAPACITY);

        // Single writer: outbound frames are sent in submission order.
        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(action = frame.action(), error = %e, "failed to encode outbound frame");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    let _ = writer_events
                        .send(TransportEvent::Error(format!("send failed: {e}")))
                        .await;
                    return;
                }
                debug!(action = frame.action(), "frame sent");
            }
            // The session dropped its sender; close politely.
            let _ = write.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            loop {
                let event = match read.next().await {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text.as_str().to_owned()),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(_) => {
                            warn!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => TransportEvent::Closed,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => TransportEvent::Error(e.to_string()),
                };
                let terminal = !matches!(event, TransportEvent::Frame(_));
                if event_tx.send(event).await.is_err() || terminal {
                    break;
                }
            }
        });

        Ok(Transport {
            inbound: event_rx,
            outbound: frame_tx,
        })
    }
}

/// Accept bare `host:port/path` endpoints by assuming `ws://`.
fn normalise_url(url: &str) -> String {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else {
        format!("ws://{url}")
    }
}
