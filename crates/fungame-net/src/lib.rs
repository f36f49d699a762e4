//! Real-time transport: event envelopes, WebSocket and framed-TCP links with
//! fallback, reconnection with backoff, and request/ack correlation.

pub mod envelope;
pub mod framing;
pub mod link;
pub mod reconnection;
pub mod state;
pub mod transport;


pub use envelope::{ACK_EVENT, Envelope, MessageError};
pub use framing::{FrameConfig, FrameError, read_envelope, write_envelope};
pub use link::{Link, LinkError, TransportKind};
pub use reconnection::{ReconnectConfig, ReconnectError, ReconnectState};
pub use state::{ConnectionState, ConnectionStateWatch};
pub use transport::{
    AckReceiver, Transport, TransportClient, TransportConfig, TransportError, TransportEvent,
};
