//! Transport client: the supervised real-time connection.
//!
//! [`TransportClient::spawn`] starts a supervisor task that connects using the
//! configured transport order, keeps the link alive, correlates
//! acknowledgements with requests and reconnects with backoff when the link
//! drops. Lifecycle changes and server pushes arrive as [`TransportEvent`]s.
//!
//! Sending never fails loudly: while no link is up, [`Transport::emit`]
//! returns `false` and [`Transport::request`] returns `None`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::envelope::Envelope;
use crate::framing::FrameConfig;
use crate::link::{Link, LinkError, TransportKind};
use crate::reconnection::{ReconnectConfig, ReconnectError, ReconnectState};
use crate::state::{ConnectionState, ConnectionStateWatch};

/// Capacity of the event channel handed to the consumer.
const EVENT_CAPACITY: usize = 256;

/// Resolves with the acknowledgement payload of a request.
///
/// The sender is dropped, and the receiver errors, when the link goes away
/// before the server answers.
pub type AckReceiver = oneshot::Receiver<Value>;

/// Connection settings of the transport client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:5000/ws`.
    pub socket_url: String,
    /// Framed-TCP endpoint, e.g. `127.0.0.1:5001`.
    pub tcp_address: String,
    /// Transports tried, in order, on every connection attempt.
    pub order: Vec<TransportKind>,
    /// Per-transport connect timeout.
    pub connect_timeout: Duration,
    /// Interval between keepalives on an idle or busy link.
    pub keepalive: Duration,
    pub reconnect: ReconnectConfig,
    pub frame: FrameConfig,
}

impl TransportConfig {
    /// Defaults for everything except the two endpoints.
    pub fn new(socket_url: impl Into<String>, tcp_address: impl Into<String>) -> Self {
        Self {
            socket_url: socket_url.into(),
            tcp_address: tcp_address.into(),
            order: vec![TransportKind::WebSocket, TransportKind::FramedTcp],
            connect_timeout: Duration::from_secs(5),
            keepalive: Duration::from_secs(5),
            reconnect: ReconnectConfig::default(),
            frame: FrameConfig::default(),
        }
    }

    /// Reject settings that would stall or crash the supervisor.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.order.is_empty() {
            return Err(LinkError::NoTransports.into());
        }
        if self.connect_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "connect timeout must be non-zero".to_string(),
            ));
        }
        if self.keepalive.is_zero() {
            return Err(TransportError::InvalidConfig(
                "keepalive interval must be non-zero".to_string(),
            ));
        }
        if self.frame.max_payload_size == 0 {
            return Err(TransportError::InvalidConfig(
                "maximum frame size must be non-zero".to_string(),
            ));
        }
        self.reconnect.validate()?;
        Ok(())
    }
}

/// Lifecycle changes and inbound traffic of the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A link is up.
    Connected(TransportKind),
    /// The link dropped, or reconnection was abandoned.
    Disconnected(String),
    /// A connection attempt failed on every configured transport.
    ConnectError(String),
    /// A server push (anything other than an acknowledgement).
    Message(Envelope),
}

/// Errors surfaced by the transport client itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("invalid transport settings: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Reconnect(#[from] ReconnectError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// The send side of the real-time channel, as seen by the client logic.
pub trait Transport: Send + Sync {
    /// Send a fire-and-forget event. Returns `false` if nothing was queued.
    fn emit(&self, event: &str, data: Value) -> bool;

    /// Send an event that expects an acknowledgement.
    fn request(&self, event: &str, data: Value) -> Option<AckReceiver>;

    /// Whether a link is currently up.
    fn is_connected(&self) -> bool;

    /// Stop the connection and any reconnection.
    fn close(&self);
}

enum Outbound {
    Emit(Envelope),
    Request(Envelope, oneshot::Sender<Value>),
}

/// Handle to the supervised connection. Cheap to clone.
#[derive(Clone)]
pub struct TransportClient {
    outbound: mpsc::UnboundedSender<Outbound>,
    state: Arc<ConnectionStateWatch>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl TransportClient {
    /// Validate `config` and start the supervisor task. Must be called inside
    /// a tokio runtime.
    pub fn spawn(
        config: TransportConfig,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), TransportError> {
        config.validate()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(ConnectionStateWatch::new());

        let supervisor = Supervisor {
            config,
            outbound: outbound_rx,
            events: events_tx,
            state: Arc::clone(&state),
            shutdown: shutdown_rx,
        };
        tokio::spawn(supervisor.run());

        let client = Self {
            outbound: outbound_tx,
            state,
            shutdown: Arc::new(shutdown_tx),
        };
        Ok((client, events_rx))
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn ensure_connected(&self, event: &str) -> Result<(), TransportError> {
        if self.state.is_connected() {
            return Ok(());
        }
        let err = TransportError::NotConnected;
        warn!(event, "dropping outbound event: {err}");
        Err(err)
    }
}

impl Transport for TransportClient {
    fn emit(&self, event: &str, data: Value) -> bool {
        if self.ensure_connected(event).is_err() {
            return false;
        }
        self.outbound
            .send(Outbound::Emit(Envelope::new(event, data)))
            .is_ok()
    }

    fn request(&self, event: &str, data: Value) -> Option<AckReceiver> {
        self.ensure_connected(event).ok()?;
        let (tx, rx) = oneshot::channel();
        self.outbound
            .send(Outbound::Request(Envelope::new(event, data), tx))
            .ok()?;
        Some(rx)
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// How a link ended.
enum LinkEnd {
    /// Shutdown requested, or every client handle was dropped.
    Shutdown,
    /// The event consumer went away.
    ConsumerGone,
    /// The connection failed; reconnect.
    Lost(String),
}

struct Supervisor {
    config: TransportConfig,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
    state: Arc<ConnectionStateWatch>,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    async fn run(mut self) {
        let mut backoff = ReconnectState::new(self.config.reconnect.clone());

        loop {
            self.state.set(ConnectionState::Connecting);

            let attempt = tokio::select! {
                _ = self.shutdown.changed() => break,
                attempt = connect_any(&self.config) => attempt,
            };

            match attempt {
                Ok(link) => {
                    backoff.reset();
                    // Anything queued for the previous link is stale.
                    while self.outbound.try_recv().is_ok() {}

                    let kind = link.kind();
                    info!(transport = %kind, "connected");
                    self.state.set(ConnectionState::Connected);
                    if self.events.send(TransportEvent::Connected(kind)).await.is_err() {
                        break;
                    }

                    match self.run_link(link).await {
                        LinkEnd::Shutdown | LinkEnd::ConsumerGone => break,
                        LinkEnd::Lost(reason) => {
                            warn!(transport = %kind, %reason, "connection lost");
                            self.state.set(ConnectionState::Connecting);
                            if self.events.send(TransportEvent::Disconnected(reason)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!("connection attempt failed: {e}");
                    if self.events.send(TransportEvent::ConnectError(e.to_string())).await.is_err() {
                        break;
                    }
                }
            }

            let Some(delay) = backoff.next_delay() else {
                let err = TransportError::from(ReconnectError::MaxAttemptsExhausted);
                warn!(attempts = backoff.attempts(), "giving up: {err}");
                self.state.set(ConnectionState::Disconnected);
                let _ = self.events.send(TransportEvent::Disconnected(err.to_string())).await;
                return;
            };

            debug!(attempt = backoff.attempts(), ?delay, "reconnecting after delay");
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state.set(ConnectionState::Disconnected);
        debug!("transport supervisor stopped");
    }

    async fn run_link(&mut self, mut link: Link) -> LinkEnd {
        let mut pending: HashMap<u64, oneshot::Sender<Value>> = HashMap::new();
        let mut next_ack: u64 = 1;
        let mut last_error: Option<String> = None;

        let period = self.config.keepalive;
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                _ = self.shutdown.changed() => break LinkEnd::Shutdown,

                inbound = link.recv() => match inbound {
                    Some(Ok(env)) if env.is_ack() => {
                        let id = env.ack.unwrap_or_default();
                        match pending.remove(&id) {
                            Some(reply) => {
                                let _ = reply.send(env.data);
                            }
                            None => debug!(ack = id, "ack for unknown request"),
                        }
                    }
                    Some(Ok(env)) => {
                        trace!(event = %env.event, "inbound");
                        if self.events.send(TransportEvent::Message(env)).await.is_err() {
                            break LinkEnd::ConsumerGone;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("inbound error: {e}");
                        last_error = Some(e.to_string());
                    }
                    None => {
                        break LinkEnd::Lost(
                            last_error.take().unwrap_or_else(|| "connection closed".to_string()),
                        );
                    }
                },

                outbound = self.outbound.recv() => {
                    let result = match outbound {
                        None => break LinkEnd::Shutdown,
                        Some(Outbound::Emit(env)) => link.send(&env).await,
                        Some(Outbound::Request(mut env, reply)) => {
                            let id = next_ack;
                            next_ack += 1;
                            env.ack = Some(id);
                            let sent = link.send(&env).await;
                            if sent.is_ok() {
                                pending.insert(id, reply);
                            }
                            sent
                        }
                    };
                    match result {
                        Ok(()) => {}
                        Err(e) if e.is_fatal() => break LinkEnd::Lost(e.to_string()),
                        Err(e) => warn!("outbound event dropped: {e}"),
                    }
                }

                _ = keepalive.tick() => {
                    if let Err(e) = link.keepalive().await {
                        break LinkEnd::Lost(e.to_string());
                    }
                }
            }
        };

        if !pending.is_empty() {
            debug!(count = pending.len(), "dropping unanswered requests");
        }
        link.close().await;
        end
    }
}

/// Try each configured transport in order; the first to connect wins.
async fn connect_any(config: &TransportConfig) -> Result<Link, LinkError> {
    let mut last = LinkError::NoTransports;
    for &kind in &config.order {
        match tokio::time::timeout(config.connect_timeout, connect_kind(kind, config)).await {
            Ok(Ok(link)) => return Ok(link),
            Ok(Err(e)) => {
                debug!(transport = %kind, "transport unavailable: {e}");
                last = e;
            }
            Err(_) => {
                debug!(transport = %kind, "transport connect timed out");
                last = LinkError::Timeout(config.connect_timeout);
            }
        }
    }
    Err(last)
}

async fn connect_kind(kind: TransportKind, config: &TransportConfig) -> Result<Link, LinkError> {
    match kind {
        TransportKind::WebSocket => Link::connect_websocket(&config.socket_url, &config.frame).await,
        TransportKind::FramedTcp => Link::connect_tcp(&config.tcp_address, &config.frame).await,
    }
}
