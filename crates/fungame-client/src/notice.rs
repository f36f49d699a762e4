use std::fmt;

use crate::error::ClientError;
use crate::model::Identity;

/// User-facing notifications produced by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A join completed and the identity was adopted.
    Joined(Identity),
    /// The stored game no longer exists; the session was dropped.
    SessionExpired { game_id: String },
    /// The stored session was cleared on request.
    SessionCleared,
    Failure(ClientError),
    /// The server refused an action.
    ActionRejected(String),
    PlayerDisconnected(String),
    PlayerLeft(String),
    ConnectionLost(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined(identity) => match &identity.name {
                Some(name) => write!(f, "joined game {} as {name}", identity.game_id()),
                None => write!(f, "joined game {} as {}", identity.game_id(), identity.player_id()),
            },
            Self::SessionExpired { game_id } => {
                write!(f, "game {game_id} no longer exists; join or create a new one")
            }
            Self::SessionCleared => f.write_str("stored player cleared"),
            Self::Failure(ClientError::JoinConflict(msg)) => write!(
                f,
                "{msg}: this player is connected elsewhere; retry later or clear the stored player"
            ),
            Self::Failure(err) => write!(f, "{err}"),
            Self::ActionRejected(reason) => write!(f, "action rejected: {reason}"),
            Self::PlayerDisconnected(id) => write!(f, "player {id} disconnected"),
            Self::PlayerLeft(id) => write!(f, "player {id} left"),
            Self::ConnectionLost(reason) => write!(f, "connection lost: {reason}"),
        }
    }
}
