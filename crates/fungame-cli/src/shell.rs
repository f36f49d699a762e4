//! Interactive loop: stdin commands in, notices and rosters out.

use std::sync::Arc;

use fungame_client::{ClientHandle, GameDirectory, HttpDirectory, Notice, SessionStore, roster};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::command::{self, Command, HELP};

pub struct Shell {
    handle: ClientHandle,
    directory: Arc<HttpDirectory>,
    store: Arc<dyn SessionStore>,
    local_player: Option<String>,
    last_roster: String,
}

impl Shell {
    pub fn new(
        handle: ClientHandle,
        directory: Arc<HttpDirectory>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let local_player = store.load().map(|session| session.player_id);
        Self {
            handle,
            directory,
            store,
            local_player,
            last_roster: String::new(),
        }
    }

    /// Run until `quit`, end of input, or the client stops. Shuts the client down.
    pub async fn run(mut self) {
        match &self.local_player {
            Some(id) => println!("stored player {id}; rejoining once connected"),
            None => println!("no stored player; type `join` to find or create a game"),
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut state = self.handle.state();

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match command::parse(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(command)) => self.execute(command).await,
                        Ok(None) => {}
                        Err(e) => println!("{e}"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!("cannot read stdin: {e}");
                        break;
                    }
                },

                Some(notice) = self.handle.next_notice() => self.on_notice(notice),

                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = state.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        let text = roster(&snapshot, self.local_player.as_deref());
                        if text != self.last_roster {
                            println!("{text}");
                            self.last_roster = text;
                        }
                    }
                }
            }
        }

        self.handle.shutdown();
    }

    fn on_notice(&mut self, notice: Notice) {
        match &notice {
            Notice::Joined(identity) => self.local_player = Some(identity.player_id().to_string()),
            Notice::SessionCleared | Notice::SessionExpired { .. } => {
                self.local_player = None;
                self.last_roster.clear();
            }
            _ => {}
        }
        println!("* {notice}");
    }

    async fn execute(&self, command: Command) {
        match command {
            Command::Join => self.handle.join(),
            Command::Act(action) => self.handle.act(action),
            Command::Clear => self.handle.clear(),
            Command::Roster => match self.handle.latest_state() {
                Some(snapshot) => println!("{}", roster(&snapshot, self.local_player.as_deref())),
                None => println!("no game state yet"),
            },
            Command::State => self.fetch_state().await,
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
    }

    /// Fetch a snapshot over REST for the current or stored game.
    async fn fetch_state(&self) {
        let game_id = self
            .handle
            .latest_state()
            .map(|snapshot| snapshot.id.clone())
            .or_else(|| self.store.load().map(|session| session.game_id));
        let Some(game_id) = game_id else {
            println!("no game to query; join one first");
            return;
        };

        let directory = Arc::clone(&self.directory);
        match tokio::task::spawn_blocking(move || directory.game_state(&game_id)).await {
            Ok(Ok(snapshot)) => {
                println!("{}", roster(&snapshot, self.local_player.as_deref()));
            }
            Ok(Err(e)) => println!("state request failed: {e}"),
            Err(e) => warn!("state request task failed: {e}"),
        }
    }
}
