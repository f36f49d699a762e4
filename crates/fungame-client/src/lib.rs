//! FunGame client core: session persistence, the game directory, join
//! negotiation, snapshot reconciliation and action gating, plus the async
//! driver that ties them to the transport.

pub mod action_gate;
pub mod client;
pub mod directory;
pub mod error;
pub mod join;
pub mod model;
pub mod notice;
pub mod reconcile;
pub mod rejection;
pub mod roster;
pub mod session_store;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use action_gate::{GateRefusal, authorize};
pub use client::{ClientCommand, ClientHandle, GameClient};
pub use directory::{DirectoryError, GameDirectory, HttpDirectory};
pub use error::ClientError;
pub use join::{JoinPhase, JoinProtocol, JoinState, LobbySettings};
pub use model::{
    Action, ActionEnvelope, GameState, GameStatus, GameSummary, Identity, Monster, Player,
    PlayerSlot, Position, Session, Tile,
};
pub use notice::Notice;
pub use reconcile::{ApplyOutcome, StateView};
pub use roster::roster;
pub use session_store::{FileSessionStore, InvalidProfile, MemorySessionStore, SessionStore};
