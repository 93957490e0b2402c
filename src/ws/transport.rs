//! Thin adapter over the WebSocket transport.
//!
//! The engine only ever exchanges text frames. The adapter owns the
//! connect step (TLS, frame-size cap) and exposes the split halves:
//! a writer for text frames and coded closes, and a reader that
//! surfaces text, frame-level pings, and closure.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::Result;

/// Maximum accepted incoming frame size: 10 MiB. Full-depth snapshots
/// for busy markets run large.
pub(crate) const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why the client is closing the connection; maps to the close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseIntent {
    /// Client-initiated close (code 1000).
    Normal,
    /// Setup failure or timeout (code 1001).
    GoingAway,
}

impl CloseIntent {
    fn code(self) -> CloseCode {
        match self {
            CloseIntent::Normal => CloseCode::Normal,
            CloseIntent::GoingAway => CloseCode::Away,
        }
    }
}

/// Write half of the transport.
pub(crate) struct TransportWriter {
    sink: SplitSink<WsStream, Message>,
}

impl TransportWriter {
    /// Send one text frame.
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Reply to a frame-level ping.
    pub async fn send_pong_frame(&mut self, payload: Vec<u8>) -> Result<()> {
        self.sink.send(Message::Pong(payload)).await?;
        Ok(())
    }

    /// Send a close frame with the intent's code and shut the sink.
    /// Errors are swallowed: the peer may already be gone.
    pub async fn close(&mut self, intent: CloseIntent) {
        let frame = CloseFrame {
            code: intent.code(),
            reason: "".into(),
        };
        if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
            debug!("close frame not delivered: {e}");
        }
        let _ = self.sink.close().await;
    }
}

/// One observation from the read half.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// A complete text frame.
    Text(String),
    /// A frame-level ping that needs a pong reply.
    Ping(Vec<u8>),
    /// The peer closed the connection.
    Closed,
}

/// Read half of the transport.
pub(crate) struct TransportReader {
    stream: SplitStream<WsStream>,
}

impl TransportReader {
    /// Wait for the next relevant transport event.
    ///
    /// Binary frames, pongs, and raw frames are skipped. Stream end and
    /// close frames both surface as [`TransportEvent::Closed`]; read
    /// failures surface as errors.
    pub async fn next_event(&mut self) -> Result<TransportEvent> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(TransportEvent::Closed);
            };
            match message? {
                Message::Text(text) => return Ok(TransportEvent::Text(text)),
                Message::Ping(payload) => return Ok(TransportEvent::Ping(payload)),
                Message::Close(frame) => {
                    debug!("server close frame: {frame:?}");
                    return Ok(TransportEvent::Closed);
                }
                other => {
                    debug!("ignoring non-text frame: {other:?}");
                }
            }
        }
    }
}

/// Open the transport and split it into its halves.
pub(crate) async fn connect(url: &str) -> Result<(TransportWriter, TransportReader)> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_FRAME_BYTES);
    config.max_frame_size = Some(MAX_FRAME_BYTES);

    let (stream, response) = connect_async_with_config(url, Some(config), false).await?;
    debug!("transport connected (status: {})", response.status());

    let (sink, stream) = stream.split();
    Ok((
        TransportWriter { sink },
        TransportReader { stream },
    ))
}
