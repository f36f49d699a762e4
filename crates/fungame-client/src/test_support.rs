//! Test doubles: a tiny_http directory stub and an in-memory directory.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tiny_http::{Header, Response, Server};

use crate::directory::{DirectoryError, GameDirectory};
use crate::model::{GameState, GameSummary, PlayerSlot};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
}

/// HTTP server answering every request through a routing closure.
pub struct StubDirectoryServer {
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl StubDirectoryServer {
    /// `route(method, url, body)` returns the status and JSON body to send.
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&str, &str, &str) -> (u16, String) + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let method = request.method().to_string();
                    let url = request.url().to_string();

                    let (status, reply) = route(&method, &url, &body);
                    requests.lock().unwrap().push(RecordedRequest { method, url, body });

                    let header =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                    let response = Response::from_string(reply)
                        .with_status_code(status)
                        .with_header(header);
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            requests,
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.server.server_addr().to_ip().unwrap())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubDirectoryServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// In-memory directory that records the calls made against it.
#[derive(Default)]
pub struct FakeDirectory {
    games: Mutex<Vec<GameSummary>>,
    calls: Mutex<Vec<String>>,
    fail_listing: Mutex<bool>,
}

impl FakeDirectory {
    pub fn with_games(ids: &[&str]) -> Self {
        let fake = Self::default();
        *fake.games.lock().unwrap() = ids.iter().map(|id| summary(id)).collect();
        fake
    }

    pub fn set_games(&self, ids: &[&str]) {
        *self.games.lock().unwrap() = ids.iter().map(|id| summary(id)).collect();
    }

    pub fn fail_listing(&self, fail: bool) {
        *self.fail_listing.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn summary(id: &str) -> GameSummary {
    GameSummary {
        game_id: id.to_string(),
        name: None,
        max_players: None,
        status: None,
    }
}

impl GameDirectory for FakeDirectory {
    fn list_games(&self) -> Result<Vec<GameSummary>, DirectoryError> {
        self.record("list".into());
        if *self.fail_listing.lock().unwrap() {
            return Err(DirectoryError::Status {
                endpoint: "GET /api/games".into(),
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(self.games.lock().unwrap().clone())
    }

    fn create_game(&self, name: &str, max_players: u32) -> Result<GameSummary, DirectoryError> {
        self.record(format!("create:{name}:{max_players}"));
        let game = summary("created");
        self.games.lock().unwrap().push(game.clone());
        Ok(game)
    }

    fn join_game(&self, game_id: &str) -> Result<PlayerSlot, DirectoryError> {
        self.record(format!("join:{game_id}"));
        if !self.games.lock().unwrap().iter().any(|g| g.game_id == game_id) {
            return Err(DirectoryError::Status {
                endpoint: format!("POST /api/games/{game_id}/join"),
                status: 404,
                body: r#"{"error":"game not found"}"#.into(),
            });
        }
        let n = self.calls.lock().unwrap().len();
        Ok(PlayerSlot {
            player_id: format!("p{n}"),
            name: None,
        })
    }

    fn game_state(&self, game_id: &str) -> Result<GameState, DirectoryError> {
        self.record(format!("state:{game_id}"));
        Ok(GameState {
            id: game_id.to_string(),
            name: String::new(),
            status: Default::default(),
            map: Vec::new(),
            players: Vec::new(),
            monsters: Vec::new(),
            current_turn: None,
            turn_queue: Vec::new(),
            seq: None,
        })
    }
}
