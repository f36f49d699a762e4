//! Wire and domain types shared by the client components.
//!
//! Directory and session payloads use the server's camelCase keys; game-state
//! snapshots use its snake_case keys. Unknown fields are ignored everywhere so
//! newer servers keep working.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The persisted `{gameId, playerId}` pair of this client profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub game_id: String,
    pub player_id: String,
}

impl Session {
    pub fn new(game_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            player_id: player_id.into(),
        }
    }
}

/// The identity adopted after a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub session: Session,
    /// Display name from the `joined` payload, when the server sent one.
    pub name: Option<String>,
}

impl Identity {
    pub fn game_id(&self) -> &str {
        &self.session.game_id
    }

    pub fn player_id(&self) -> &str {
        &self.session.player_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// 24-bit RGB.
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: u32,
    pub hp: i32,
    #[serde(default)]
    pub max_hp: i32,
    #[serde(default)]
    pub position: Position,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: u32,
    #[serde(default)]
    pub ac: i32,
    #[serde(default)]
    pub initiative: i32,
    #[serde(default)]
    pub is_connected: bool,
}

impl Player {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
}

/// One map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Tile {
    Floor,
    Wall,
    /// A tile code this client does not know.
    Unknown(u8),
}

impl From<u8> for Tile {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Floor,
            1 => Self::Wall,
            other => Self::Unknown(other),
        }
    }
}

impl From<Tile> for u8 {
    fn from(tile: Tile) -> Self {
        match tile {
            Tile::Floor => 0,
            Tile::Wall => 1,
            Tile::Unknown(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Waiting,
    Running,
    Finished,
    #[serde(other)]
    Unknown,
}

/// A full game snapshot. Each one replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: GameStatus,
    /// Rows of tiles; empty until the game has started.
    #[serde(default, deserialize_with = "null_as_default")]
    pub map: Vec<Vec<Tile>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub players: Vec<Player>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monsters: Vec<Monster>,
    #[serde(default)]
    pub current_turn: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub turn_queue: Vec<String>,
    /// Monotonic snapshot sequence number, when the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl GameState {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.current_turn.as_deref().and_then(|id| self.player(id))
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        let row = self.map.get(usize::try_from(pos.y).ok()?)?;
        row.get(usize::try_from(pos.x).ok()?).copied()
    }
}

/// One entry of the game directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub game_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The player allocated by a REST join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSlot {
    pub player_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move {
        x: i32,
        y: i32,
    },
    Attack {
        #[serde(rename = "targetId")]
        target_id: String,
    },
    Respawn,
}

impl Action {
    pub fn is_respawn(&self) -> bool {
        matches!(self, Self::Respawn)
    }
}

/// The `action` event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    pub game_id: String,
    pub player_id: String,
    pub action: Action,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_from_server_dict() {
        let snapshot: GameState = serde_json::from_value(json!({
            "id": "g1",
            "name": "New Game",
            "status": "running",
            "players": [{
                "id": "p1", "name": "Brave Fox", "hp": 7, "max_hp": 10, "ac": 10,
                "position": {"x": 3, "y": 4}, "initiative": 12, "is_connected": true,
                "color": 65280, "score": 2
            }],
            "monsters": [{"id": "m1", "name": "goblin", "hp": 4, "position": {"x": 1, "y": 1}}],
            "turn_queue": ["p1", "m1"],
            "current_turn": "p1",
            "log": [{"event": "game_started"}],
            "map": [[0, 1], [1, 2]]
        }))
        .unwrap();

        assert_eq!(snapshot.status, GameStatus::Running);
        assert_eq!(snapshot.player("p1").unwrap().position, Position::new(3, 4));
        assert_eq!(snapshot.current_player().unwrap().name, "Brave Fox");
        assert_eq!(snapshot.tile(Position::new(1, 0)), Some(Tile::Wall));
        assert_eq!(snapshot.tile(Position::new(1, 1)), Some(Tile::Unknown(2)));
        assert_eq!(snapshot.tile(Position::new(-1, 0)), None);
        assert_eq!(snapshot.seq, None);
    }

    #[test]
    fn test_waiting_game_with_null_map_and_color() {
        let snapshot: GameState = serde_json::from_value(json!({
            "id": "g1",
            "status": "lobby",
            "map": null,
            "players": [{"id": "p1", "hp": 10, "color": null}],
            "current_turn": null
        }))
        .unwrap();

        assert!(snapshot.map.is_empty());
        assert_eq!(snapshot.status, GameStatus::Unknown);
        assert_eq!(snapshot.players[0].color, 0);
        assert_eq!(snapshot.current_turn, None);
    }

    #[test]
    fn test_action_wire_shape() {
        let envelope = ActionEnvelope {
            game_id: "g1".into(),
            player_id: "p1".into(),
            action: Action::Attack {
                target_id: "p2".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"gameId": "g1", "playerId": "p1", "action": {"type": "attack", "targetId": "p2"}})
        );
        assert_eq!(
            serde_json::to_value(Action::Respawn).unwrap(),
            json!({"type": "respawn"})
        );
    }

    #[test]
    fn test_directory_payloads() {
        let games: Vec<GameSummary> = serde_json::from_value(json!([
            {"gameId": "g1", "name": "A", "status": "waiting"},
            {"gameId": "g2", "maxPlayers": 4}
        ]))
        .unwrap();
        assert_eq!(games[0].name.as_deref(), Some("A"));
        assert_eq!(games[1].max_players, Some(4));

        let slot: PlayerSlot =
            serde_json::from_value(json!({"playerId": "p9", "name": "Wise Owl", "id": "g1"})).unwrap();
        assert_eq!(slot.player_id, "p9");
    }
}
