//! The client driver.
//!
//! [`GameClient::run`] is one task that owns the join protocol, the state view
//! and the action gate. Transport events, user commands and the results of
//! directory calls and join acks all funnel into its `select!` loop, so
//! protocol transitions never run concurrently. Directory calls are blocking
//! and run on the blocking pool; their results come back tagged with the
//! attempt that issued them.

use std::sync::Arc;

use fungame_net::{Transport, TransportEvent};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::action_gate::authorize;
use crate::directory::{DirectoryError, GameDirectory};
use crate::error::ClientError;
use crate::join::{AttemptId, JoinCommand, JoinPhase, JoinProtocol, LobbySettings};
use crate::model::{Action, GameState, GameSummary, PlayerSlot};
use crate::notice::Notice;
use crate::reconcile::{ApplyOutcome, StateView};
use crate::session_store::SessionStore;
use crate::wire::{AckReply, ServerEvent};

/// Requests from the user side.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Join,
    Clear,
    Act {
        action: Action,
        game_override: Option<String>,
    },
    Shutdown,
}

/// Results of work started on behalf of the protocol.
enum Completion {
    GamesListed(AttemptId, Result<Vec<GameSummary>, DirectoryError>),
    GameCreated(AttemptId, Result<GameSummary, DirectoryError>),
    PlayerAllocated(AttemptId, Result<PlayerSlot, DirectoryError>),
    /// `None` when the join never reached the server or the link dropped.
    JoinAck(AttemptId, Option<AckReply>),
}

/// User-side handle to a running [`GameClient`].
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    state: watch::Receiver<Option<Arc<GameState>>>,
    phase: watch::Receiver<JoinPhase>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl ClientHandle {
    fn send(&self, command: ClientCommand) {
        if self.commands.send(command).is_err() {
            debug!("client stopped; command dropped");
        }
    }

    /// Join a game (create one if none is listed), or rejoin the stored one.
    pub fn join(&self) {
        self.send(ClientCommand::Join);
    }

    /// Forget the stored player.
    pub fn clear(&self) {
        self.send(ClientCommand::Clear);
    }

    pub fn act(&self, action: Action) {
        self.send(ClientCommand::Act {
            action,
            game_override: None,
        });
    }

    /// Send an action to a specific game.
    pub fn act_in(&self, game_id: &str, action: Action) {
        self.send(ClientCommand::Act {
            action,
            game_override: Some(game_id.to_string()),
        });
    }

    pub fn shutdown(&self) {
        self.send(ClientCommand::Shutdown);
    }

    /// Watch the latest game snapshot.
    pub fn state(&self) -> watch::Receiver<Option<Arc<GameState>>> {
        self.state.clone()
    }

    pub fn latest_state(&self) -> Option<Arc<GameState>> {
        self.state.borrow().clone()
    }

    /// Watch the join phase.
    pub fn phase(&self) -> watch::Receiver<JoinPhase> {
        self.phase.clone()
    }

    /// Next user notification; `None` once the client has stopped.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }
}

pub struct GameClient {
    transport: Arc<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
    transport_open: bool,
    directory: Arc<dyn GameDirectory>,
    protocol: JoinProtocol,
    view: StateView,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    notices: mpsc::UnboundedSender<Notice>,
    phase: watch::Sender<JoinPhase>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl GameClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<TransportEvent>,
        directory: Arc<dyn GameDirectory>,
        store: Box<dyn SessionStore>,
        lobby: LobbySettings,
    ) -> (Self, ClientHandle) {
        let protocol = JoinProtocol::new(store, lobby);
        let view = StateView::new();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(protocol.phase());
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let handle = ClientHandle {
            commands: commands_tx,
            state: view.subscribe(),
            phase: phase_rx,
            notices: notices_rx,
        };

        let client = Self {
            transport,
            events,
            transport_open: true,
            directory,
            protocol,
            view,
            commands: commands_rx,
            notices: notices_tx,
            phase: phase_tx,
            completions_tx,
            completions_rx,
        };
        (client, handle)
    }

    /// Run until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        info!(phase = ?self.protocol.phase(), "client started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },

                event = self.events.recv(), if self.transport_open => match event {
                    Some(event) => self.handle_transport(event),
                    None => {
                        warn!("transport stopped");
                        self.transport_open = false;
                    }
                },

                Some(done) = self.completions_rx.recv() => self.handle_completion(done),
            }
            self.publish_phase();
        }

        self.transport.close();
        info!("client stopped");
    }

    fn publish_phase(&self) {
        let phase = self.protocol.phase();
        self.phase.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });
    }

    fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Join => {
                let commands = self.protocol.request_join();
                self.execute(commands);
            }
            ClientCommand::Clear => {
                let commands = self.protocol.clear();
                self.view.reset();
                self.execute(commands);
            }
            ClientCommand::Act {
                action,
                game_override,
            } => self.send_action(action, game_override.as_deref()),
            ClientCommand::Shutdown => {}
        }
    }

    fn send_action(&self, action: Action, game_override: Option<&str>) {
        let stored = self.protocol.stored_session();
        let latest = self.view.latest();
        let envelope = match authorize(
            action,
            game_override,
            stored.as_ref(),
            self.protocol.identity(),
            latest.as_deref(),
        ) {
            Ok(envelope) => envelope,
            Err(refusal) => {
                debug!(%refusal, "action not sent");
                return;
            }
        };

        match serde_json::to_value(&envelope) {
            Ok(data) => {
                if !self.transport.emit("action", data) {
                    debug!("action not sent: {}", ClientError::TransportUnavailable);
                }
            }
            Err(e) => warn!("cannot encode action: {e}"),
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(kind) => {
                info!(transport = %kind, "connected to game server");
                let commands = self.protocol.on_connected();
                self.execute(commands);
            }
            TransportEvent::Disconnected(reason) => {
                let commands = self.protocol.on_disconnected();
                self.notify(Notice::ConnectionLost(reason));
                self.execute(commands);
            }
            TransportEvent::ConnectError(err) => debug!("connect error: {err}"),
            TransportEvent::Message(env) => {
                let name = env.event.clone();
                match ServerEvent::from_envelope(env) {
                    Ok(event) => self.handle_server_event(event),
                    Err(e) => warn!(event = %name, "undecodable server event: {e}"),
                }
            }
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected(info) => debug!(%info, "server greeting"),
            ServerEvent::StateUpdate(snapshot) => self.apply_snapshot(snapshot),
            ServerEvent::GameStarted(snapshot) => {
                info!(game_id = %snapshot.id, "game started");
                self.apply_snapshot(snapshot);
            }
            ServerEvent::Joined(info) => {
                let commands = self.protocol.on_joined_event(info);
                self.execute(commands);
            }
            ServerEvent::Error(message) => {
                let commands = self.protocol.on_server_error(message);
                self.execute(commands);
            }
            ServerEvent::ActionError(message) => {
                self.notify(Notice::ActionRejected(message.text().to_string()));
            }
            ServerEvent::ActionAck(reply) => debug!(%reply, "action acknowledged"),
            ServerEvent::PlayerDisconnected(id) => self.notify(Notice::PlayerDisconnected(id)),
            ServerEvent::PlayerLeft(id) => self.notify(Notice::PlayerLeft(id)),
            ServerEvent::Other(name) => debug!(event = %name, "unhandled server event"),
        }
    }

    fn apply_snapshot(&mut self, snapshot: GameState) {
        if self.view.apply(snapshot) == ApplyOutcome::Stale {
            debug!("stale snapshot ignored");
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        let commands = match done {
            Completion::GamesListed(attempt, result) => self.protocol.on_games_listed(attempt, result),
            Completion::GameCreated(attempt, result) => self.protocol.on_game_created(attempt, result),
            Completion::PlayerAllocated(attempt, result) => {
                self.protocol.on_player_allocated(attempt, result)
            }
            Completion::JoinAck(attempt, Some(reply)) => self.protocol.on_join_ack(attempt, reply),
            Completion::JoinAck(attempt, None) => self.protocol.on_join_undelivered(attempt),
        };
        self.execute(commands);
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    fn execute(&mut self, commands: Vec<JoinCommand>) {
        for command in commands {
            match command {
                JoinCommand::ListGames { attempt } => {
                    self.spawn_directory(move |d| Completion::GamesListed(attempt, d.list_games()));
                }
                JoinCommand::CreateGame {
                    attempt,
                    name,
                    max_players,
                } => {
                    self.spawn_directory(move |d| {
                        Completion::GameCreated(attempt, d.create_game(&name, max_players))
                    });
                }
                JoinCommand::AllocatePlayer { attempt, game_id } => {
                    self.spawn_directory(move |d| {
                        Completion::PlayerAllocated(attempt, d.join_game(&game_id))
                    });
                }
                JoinCommand::SendJoin { attempt, session } => {
                    let data = json!({ "gameId": session.game_id, "playerId": session.player_id });
                    let done = self.completions_tx.clone();
                    match self.transport.request("join", data) {
                        Some(ack) => {
                            debug!(attempt, game_id = %session.game_id, "join sent");
                            tokio::spawn(async move {
                                let reply = ack.await.ok().map(AckReply::from_value);
                                let _ = done.send(Completion::JoinAck(attempt, reply));
                            });
                        }
                        None => {
                            let _ = done.send(Completion::JoinAck(attempt, None));
                        }
                    }
                }
                JoinCommand::Notify(notice) => self.notify(notice),
            }
        }
    }

    fn spawn_directory<F>(&self, call: F)
    where
        F: FnOnce(&dyn GameDirectory) -> Completion + Send + 'static,
    {
        let directory = Arc::clone(&self.directory);
        let done = self.completions_tx.clone();
        tokio::task::spawn_blocking(move || {
            let _ = done.send(call(directory.as_ref()));
        });
    }
}
