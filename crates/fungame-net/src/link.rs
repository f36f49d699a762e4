//! One live connection to the server, over either transport encoding.
//!
//! A [`Link`] owns the write half of the connection and a background reader
//! task that decodes inbound envelopes into a channel. The reader stops on the
//! first error that leaves the stream unusable; undecodable envelopes are
//! reported but do not end the link.

use std::fmt;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::envelope::{self, Envelope, MessageError};
use crate::framing::{self, FrameConfig, FrameError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the inbound envelope channel of one link.
const INBOUND_CAPACITY: usize = 256;

/// The two wire encodings of the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// One JSON text message per envelope.
    WebSocket,
    /// Length-prefixed JSON frames over plain TCP.
    FramedTcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => f.write_str("websocket"),
            Self::FramedTcp => f.write_str("framed-tcp"),
        }
    }
}

/// Errors raised by a single link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("no transport configured")]
    NoTransports,
}

impl LinkError {
    /// Whether the link is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Message(_)
                | Self::Frame(FrameError::Message(_))
                | Self::Frame(FrameError::PayloadTooLarge { .. })
        )
    }
}

enum LinkWriter {
    WebSocket(SplitSink<WsStream, Message>),
    Tcp(OwnedWriteHalf),
}

/// A connected link with its reader task.
pub struct Link {
    kind: TransportKind,
    writer: LinkWriter,
    frame: FrameConfig,
    inbound: mpsc::Receiver<Result<Envelope, LinkError>>,
    reader: JoinHandle<()>,
}

impl Link {
    /// Open a WebSocket link to `url` (`ws://host:port/path`).
    pub async fn connect_websocket(url: &str, frame: &FrameConfig) -> Result<Self, LinkError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(frame.max_payload_size as usize);

        let (ws, _response) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), true).await?;
        let (sink, mut stream) = ws.split();
        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let item = match msg {
                    Ok(Message::Text(text)) => envelope::decode(text.as_bytes()).map_err(LinkError::from),
                    Ok(Message::Binary(bytes)) => envelope::decode(&bytes).map_err(LinkError::from),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => Err(LinkError::from(e)),
                };
                let fatal = item.as_ref().is_err_and(LinkError::is_fatal);
                if tx.send(item).await.is_err() || fatal {
                    break;
                }
            }
        });

        Ok(Self {
            kind: TransportKind::WebSocket,
            writer: LinkWriter::WebSocket(sink),
            frame: frame.clone(),
            inbound,
            reader,
        })
    }

    /// Open a framed-TCP link to `addr` (`host:port`).
    pub async fn connect_tcp(addr: &str, frame: &FrameConfig) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let (mut read_half, write_half) = stream.into_split();
        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
        let read_config = frame.clone();

        let reader = tokio::spawn(async move {
            loop {
                let item = framing::read_envelope(&mut read_half, &read_config)
                    .await
                    .map_err(LinkError::from);
                let fatal = item.as_ref().is_err_and(|e| {
                    // An oversized length prefix leaves the stream mid-frame.
                    matches!(e, LinkError::Frame(FrameError::PayloadTooLarge { .. })) || e.is_fatal()
                });
                if tx.send(item).await.is_err() || fatal {
                    break;
                }
            }
        });

        Ok(Self {
            kind: TransportKind::FramedTcp,
            writer: LinkWriter::Tcp(write_half),
            frame: frame.clone(),
            inbound,
            reader,
        })
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Send one envelope.
    ///
    /// Envelopes larger than the frame limit are refused before anything is
    /// written, leaving the link usable.
    pub async fn send(&mut self, env: &Envelope) -> Result<(), LinkError> {
        match &mut self.writer {
            LinkWriter::WebSocket(sink) => {
                let text = envelope::encode_text(env)?;
                let size = u32::try_from(text.len()).unwrap_or(u32::MAX);
                if size > self.frame.max_payload_size {
                    return Err(FrameError::PayloadTooLarge {
                        size,
                        max: self.frame.max_payload_size,
                    }
                    .into());
                }
                sink.send(Message::Text(text)).await?;
            }
            LinkWriter::Tcp(writer) => {
                framing::write_envelope(writer, env, &self.frame).await?;
            }
        }
        Ok(())
    }

    /// Send a keepalive: a WebSocket ping or an empty TCP frame.
    pub async fn keepalive(&mut self) -> Result<(), LinkError> {
        match &mut self.writer {
            LinkWriter::WebSocket(sink) => sink.send(Message::Ping(Vec::new())).await?,
            LinkWriter::Tcp(writer) => framing::write_keepalive(writer).await?,
        }
        Ok(())
    }

    /// Next inbound envelope or error. `None` once the reader has stopped.
    pub async fn recv(&mut self) -> Option<Result<Envelope, LinkError>> {
        self.inbound.recv().await
    }

    /// Close the connection, best effort.
    pub async fn close(mut self) {
        match &mut self.writer {
            LinkWriter::WebSocket(sink) => {
                let _ = sink.close().await;
            }
            LinkWriter::Tcp(writer) => {
                let _ = writer.shutdown().await;
            }
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
