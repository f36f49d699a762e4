//! Typed view of the server's real-time events.

use fungame_net::Envelope;
use serde::Deserialize;
use serde_json::Value;

use crate::model::GameState;

/// Payload of a `joined` push.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedInfo {
    pub game_id: String,
    pub player_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Payload of `error` and `action_error` pushes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ServerMessage {
    /// Human-readable text: `message`, else `error`, else empty.
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}

/// Reply to a `join` request. No `error` means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AckReply {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl AckReply {
    /// Parse an ack payload. Anything that is not an object with an `error`
    /// string counts as success.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerRef {
    player_id: String,
}

/// Server pushes the client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(Value),
    StateUpdate(GameState),
    Joined(JoinedInfo),
    Error(ServerMessage),
    ActionError(ServerMessage),
    ActionAck(Value),
    PlayerDisconnected(String),
    PlayerLeft(String),
    GameStarted(GameState),
    /// An event this client has no handler for.
    Other(String),
}

impl ServerEvent {
    pub fn from_envelope(env: Envelope) -> Result<Self, serde_json::Error> {
        let Envelope { event, data, .. } = env;
        let parsed = match event.as_str() {
            "connected" => Self::Connected(data),
            "state_update" => Self::StateUpdate(serde_json::from_value(data)?),
            "game_started" => Self::GameStarted(serde_json::from_value(data)?),
            "joined" => Self::Joined(serde_json::from_value(data)?),
            "error" => Self::Error(serde_json::from_value(data)?),
            "action_error" => Self::ActionError(serde_json::from_value(data)?),
            "action_ack" => Self::ActionAck(data),
            "player_disconnected" => {
                Self::PlayerDisconnected(serde_json::from_value::<PlayerRef>(data)?.player_id)
            }
            "player_left" => Self::PlayerLeft(serde_json::from_value::<PlayerRef>(data)?.player_id),
            _ => Self::Other(event),
        };
        Ok(parsed)
    }
}
