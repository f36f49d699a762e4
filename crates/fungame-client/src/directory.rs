//! REST client for the game directory.
//!
//! Calls are blocking; the async driver runs them on the blocking pool. Every
//! failure is final for the calling flow step: there is no retry here.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::model::{GameState, GameSummary, PlayerSlot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The request never got an answer.
    #[error("{endpoint} unreachable: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("{endpoint} returned an unreadable body: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("invalid game id {0:?}")]
    InvalidGameId(String),
}

/// The game directory operations.
pub trait GameDirectory: Send + Sync {
    /// `GET /api/games`
    fn list_games(&self) -> Result<Vec<GameSummary>, DirectoryError>;

    /// `POST /api/games`
    fn create_game(&self, name: &str, max_players: u32) -> Result<GameSummary, DirectoryError>;

    /// `POST /api/games/{gameId}/join`
    fn join_game(&self, game_id: &str) -> Result<PlayerSlot, DirectoryError>;

    /// `GET /api/games/{gameId}/state`
    fn game_state(&self, game_id: &str) -> Result<GameState, DirectoryError>;
}

impl<D: GameDirectory + ?Sized> GameDirectory for Arc<D> {
    fn list_games(&self) -> Result<Vec<GameSummary>, DirectoryError> {
        (**self).list_games()
    }

    fn create_game(&self, name: &str, max_players: u32) -> Result<GameSummary, DirectoryError> {
        (**self).create_game(name, max_players)
    }

    fn join_game(&self, game_id: &str) -> Result<PlayerSlot, DirectoryError> {
        (**self).join_game(game_id)
    }

    fn game_state(&self, game_id: &str) -> Result<GameState, DirectoryError> {
        (**self).game_state(game_id)
    }
}

/// [`GameDirectory`] over HTTP.
pub struct HttpDirectory {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpDirectory {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn game_path(game_id: &str, suffix: &str) -> Result<String, DirectoryError> {
        if game_id.is_empty() || game_id.contains(['/', '?', '#']) {
            return Err(DirectoryError::InvalidGameId(game_id.to_string()));
        }
        Ok(format!("/api/games/{game_id}/{suffix}"))
    }

    fn finish<T: DeserializeOwned>(
        endpoint: &str,
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<T, DirectoryError> {
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(DirectoryError::Status {
                    endpoint: endpoint.to_string(),
                    status,
                    body: body.trim().to_string(),
                });
            }
            Err(e) => {
                return Err(DirectoryError::Transport {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(DirectoryError::Status {
                endpoint: endpoint.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            });
        }

        debug!(endpoint, status, "directory response");
        response.into_json().map_err(|e| DirectoryError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

impl GameDirectory for HttpDirectory {
    fn list_games(&self) -> Result<Vec<GameSummary>, DirectoryError> {
        let endpoint = "GET /api/games";
        Self::finish(endpoint, self.agent.get(&self.url("/api/games")).call())
    }

    fn create_game(&self, name: &str, max_players: u32) -> Result<GameSummary, DirectoryError> {
        let endpoint = "POST /api/games";
        let body = json!({ "name": name, "maxPlayers": max_players });
        Self::finish(
            endpoint,
            self.agent.post(&self.url("/api/games")).send_json(body),
        )
    }

    fn join_game(&self, game_id: &str) -> Result<PlayerSlot, DirectoryError> {
        let path = Self::game_path(game_id, "join")?;
        let endpoint = format!("POST {path}");
        Self::finish(&endpoint, self.agent.post(&self.url(&path)).send_json(json!({})))
    }

    fn game_state(&self, game_id: &str) -> Result<GameState, DirectoryError> {
        let path = Self::game_path(game_id, "state")?;
        let endpoint = format!("GET {path}");
        Self::finish(&endpoint, self.agent.get(&self.url(&path)).call())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubDirectoryServer;

    fn directory(server: &StubDirectoryServer) -> HttpDirectory {
        HttpDirectory::new(&server.base_url(), Duration::from_secs(5))
    }

    #[test]
    fn test_list_games() {
        let server = StubDirectoryServer::start(|method, url, _| match (method, url) {
            ("GET", "/api/games") => (200, r#"[{"gameId":"g1","name":"A","status":"waiting"}]"#.into()),
            _ => (404, "{}".into()),
        });

        let games = directory(&server).list_games().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].game_id, "g1");
    }

    #[test]
    fn test_create_game_sends_name_and_max_players() {
        let server = StubDirectoryServer::start(|method, url, _| match (method, url) {
            ("POST", "/api/games") => (201, r#"{"gameId":"new","name":"New Game"}"#.into()),
            _ => (404, "{}".into()),
        });

        let created = directory(&server).create_game("New Game", 4).unwrap();
        assert_eq!(created.game_id, "new");

        let requests = server.requests();
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body, json!({"name": "New Game", "maxPlayers": 4}));
    }

    #[test]
    fn test_join_game_posts_empty_object() {
        let server = StubDirectoryServer::start(|method, url, _| match (method, url) {
            ("POST", "/api/games/g1/join") => (200, r#"{"playerId":"p1","name":"Bold Stag"}"#.into()),
            _ => (404, "{}".into()),
        });

        let slot = directory(&server).join_game("g1").unwrap();
        assert_eq!(slot.player_id, "p1");
        assert_eq!(server.requests()[0].body, "{}");
    }

    #[test]
    fn test_not_found_is_a_status_error() {
        let server = StubDirectoryServer::start(|_, _, _| (404, r#"{"error":"game not found"}"#.into()));

        let err = directory(&server).join_game("missing").unwrap_err();
        match err {
            DirectoryError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert!(body.contains("game not found"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_undecodable_body_is_a_decode_error() {
        let server = StubDirectoryServer::start(|_, _, _| (200, "<html>".into()));
        assert!(matches!(
            directory(&server).list_games(),
            Err(DirectoryError::Decode { .. })
        ));
    }

    #[test]
    fn test_unreachable_server_is_a_transport_error() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let dir = HttpDirectory::new(&format!("http://{addr}"), Duration::from_secs(2));
        assert!(matches!(dir.list_games(), Err(DirectoryError::Transport { .. })));
    }

    #[test]
    fn test_game_ids_with_path_characters_are_refused() {
        let dir = HttpDirectory::new("http://127.0.0.1:1", Duration::from_secs(1));
        for id in ["a/b", "a?b", "a#b", ""] {
            assert_eq!(
                dir.join_game(id),
                Err(DirectoryError::InvalidGameId(id.to_string()))
            );
        }
    }

    #[test]
    fn test_game_state_snapshot() {
        let server = StubDirectoryServer::start(|method, url, _| match (method, url) {
            ("GET", "/api/games/g1/state") => {
                (200, r#"{"id":"g1","status":"waiting","players":[],"map":null}"#.into())
            }
            _ => (404, "{}".into()),
        });

        let state = directory(&server).game_state("g1").unwrap();
        assert_eq!(state.id, "g1");
        assert!(state.map.is_empty());
    }
}
