//! Join negotiation: fresh join, automatic rejoin and rejection handling.
//!
//! [`JoinProtocol`] performs no I/O. Each input returns the [`JoinCommand`]s
//! the driver must execute; their results come back tagged with the
//! [`AttemptId`] they were issued under. A result whose attempt is no longer
//! current is stale and ignored, so at most one attempt is ever in flight.
//!
//! ```text
//!                 user join                    connect + game listed
//!  NoSession ───────────────▶ PendingCreateOrJoin     PendingRejoin ──────┐
//!      ▲                           │ ack ok                │ ack ok       │
//!      │ not found / other error   ▼                       ▼              │
//!      └──────────────────────── Joined ◀──────────────────┘              │
//!                                                          conflict       │
//!                                   Rejected ◀─────────────────────────────┘
//! ```

use tracing::{debug, info, warn};

use crate::directory::DirectoryError;
use crate::error::ClientError;
use crate::model::{GameSummary, Identity, PlayerSlot, Session};
use crate::notice::Notice;
use crate::rejection::{RejectionKind, classify};
use crate::session_store::SessionStore;
use crate::wire::{AckReply, JoinedInfo, ServerMessage};

/// Identifies one join attempt.
pub type AttemptId = u64;

/// Parameters of a game created on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySettings {
    pub game_name: String,
    pub max_players: u32,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            game_name: "New Game".to_string(),
            max_players: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejoinStage {
    /// Waiting for the transport to connect.
    AwaitingConnection,
    /// Checking that the stored game still exists.
    VerifyingGame,
    AwaitingAck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreshStage {
    /// Listing games to pick a target.
    Discovering,
    /// No game listed; creating one.
    Creating,
    /// Asking the directory for a player in `game_id`.
    Allocating { game_id: String },
    /// Player allocated; waiting for the transport to send the join.
    AwaitingConnection { session: Session },
    AwaitingAck { session: Session },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The stored player is connected from another client.
    Conflict,
    /// The directory could not confirm the stored game.
    VerificationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinState {
    NoSession,
    PendingRejoin {
        attempt: AttemptId,
        session: Session,
        stage: RejoinStage,
    },
    PendingCreateOrJoin {
        attempt: AttemptId,
        stage: FreshStage,
        /// Whether the flow already restarted after a conflict.
        retried: bool,
    },
    Joined(Identity),
    Rejected {
        session: Session,
        reason: RejectReason,
    },
}

/// Coarse view of [`JoinState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPhase {
    NoSession,
    PendingRejoin,
    PendingCreateOrJoin,
    Joined,
    Rejected,
}

impl JoinState {
    pub fn phase(&self) -> JoinPhase {
        match self {
            Self::NoSession => JoinPhase::NoSession,
            Self::PendingRejoin { .. } => JoinPhase::PendingRejoin,
            Self::PendingCreateOrJoin { .. } => JoinPhase::PendingCreateOrJoin,
            Self::Joined(_) => JoinPhase::Joined,
            Self::Rejected { .. } => JoinPhase::Rejected,
        }
    }

    /// The session a `join` ack for `attempt` would confirm, if one is awaited.
    fn awaited_ack(&self, attempt: AttemptId) -> Option<&Session> {
        match self {
            Self::PendingRejoin {
                attempt: current,
                session,
                stage: RejoinStage::AwaitingAck,
            }
            | Self::PendingCreateOrJoin {
                attempt: current,
                stage: FreshStage::AwaitingAck { session },
                ..
            } if *current == attempt => Some(session),
            _ => None,
        }
    }

    fn awaiting_any_ack(&self) -> Option<(AttemptId, &Session)> {
        match self {
            Self::PendingRejoin {
                attempt,
                session,
                stage: RejoinStage::AwaitingAck,
            }
            | Self::PendingCreateOrJoin {
                attempt,
                stage: FreshStage::AwaitingAck { session },
                ..
            } => Some((*attempt, session)),
            _ => None,
        }
    }
}

/// Work the driver performs on behalf of the protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinCommand {
    ListGames {
        attempt: AttemptId,
    },
    CreateGame {
        attempt: AttemptId,
        name: String,
        max_players: u32,
    },
    AllocatePlayer {
        attempt: AttemptId,
        game_id: String,
    },
    /// Send `join {gameId, playerId}` and report the ack.
    SendJoin {
        attempt: AttemptId,
        session: Session,
    },
    Notify(Notice),
}

/// The join state machine. Owns the session store.
pub struct JoinProtocol {
    store: Box<dyn SessionStore>,
    lobby: LobbySettings,
    state: JoinState,
    connected: bool,
    last_attempt: AttemptId,
}

impl JoinProtocol {
    /// Start in `PendingRejoin` when the store holds a session, else `NoSession`.
    pub fn new(store: Box<dyn SessionStore>, lobby: LobbySettings) -> Self {
        let mut protocol = Self {
            store,
            lobby,
            state: JoinState::NoSession,
            connected: false,
            last_attempt: 0,
        };
        if let Some(session) = protocol.store.load() {
            info!(game_id = %session.game_id, "stored session found; will rejoin on connect");
            let attempt = protocol.next_attempt();
            protocol.state = JoinState::PendingRejoin {
                attempt,
                session,
                stage: RejoinStage::AwaitingConnection,
            };
        }
        protocol
    }

    pub fn state(&self) -> &JoinState {
        &self.state
    }

    pub fn phase(&self) -> JoinPhase {
        self.state.phase()
    }

    /// The adopted identity, while joined.
    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            JoinState::Joined(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn stored_session(&self) -> Option<Session> {
        self.store.load()
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            JoinState::PendingRejoin { .. } | JoinState::PendingCreateOrJoin { .. }
        )
    }

    fn next_attempt(&mut self) -> AttemptId {
        self.last_attempt += 1;
        self.last_attempt
    }

    fn begin_verify(&mut self, session: Session) -> Vec<JoinCommand> {
        let attempt = self.next_attempt();
        debug!(attempt, game_id = %session.game_id, "verifying stored game");
        self.state = JoinState::PendingRejoin {
            attempt,
            session,
            stage: RejoinStage::VerifyingGame,
        };
        vec![JoinCommand::ListGames { attempt }]
    }

    fn begin_fresh(&mut self, retried: bool) -> Vec<JoinCommand> {
        let attempt = self.next_attempt();
        debug!(attempt, retried, "starting create-or-join");
        self.state = JoinState::PendingCreateOrJoin {
            attempt,
            stage: FreshStage::Discovering,
            retried,
        };
        vec![JoinCommand::ListGames { attempt }]
    }

    /// Give up the current attempt and report `err`.
    fn fail(&mut self, err: ClientError) -> Vec<JoinCommand> {
        warn!("join failed: {err}");
        self.state = JoinState::NoSession;
        vec![JoinCommand::Notify(Notice::Failure(err))]
    }

    /// The transport connected (or reconnected).
    pub fn on_connected(&mut self) -> Vec<JoinCommand> {
        self.connected = true;
        match &self.state {
            JoinState::PendingRejoin { session, .. } => {
                let session = session.clone();
                self.begin_verify(session)
            }
            JoinState::Joined(identity) => {
                let session = identity.session.clone();
                self.begin_verify(session)
            }
            JoinState::Rejected { .. } => match self.store.load() {
                Some(session) => self.begin_verify(session),
                None => Vec::new(),
            },
            JoinState::PendingCreateOrJoin {
                attempt,
                stage: FreshStage::AwaitingConnection { session },
                retried,
            } => {
                let (attempt, session, retried) = (*attempt, session.clone(), *retried);
                self.state = JoinState::PendingCreateOrJoin {
                    attempt,
                    stage: FreshStage::AwaitingAck {
                        session: session.clone(),
                    },
                    retried,
                };
                vec![JoinCommand::SendJoin { attempt, session }]
            }
            JoinState::PendingCreateOrJoin { .. } | JoinState::NoSession => Vec::new(),
        }
    }

    /// The transport dropped. Any join on the wire is lost with it.
    pub fn on_disconnected(&mut self) -> Vec<JoinCommand> {
        self.connected = false;
        let next = match &self.state {
            JoinState::PendingRejoin { session, .. } => Some((session.clone(), None)),
            JoinState::Joined(identity) => Some((identity.session.clone(), None)),
            JoinState::PendingCreateOrJoin {
                stage: FreshStage::AwaitingAck { session },
                retried,
                ..
            } => Some((session.clone(), Some(*retried))),
            _ => None,
        };

        if let Some((session, fresh)) = next {
            let attempt = self.next_attempt();
            self.state = match fresh {
                None => JoinState::PendingRejoin {
                    attempt,
                    session,
                    stage: RejoinStage::AwaitingConnection,
                },
                Some(retried) => JoinState::PendingCreateOrJoin {
                    attempt,
                    stage: FreshStage::AwaitingConnection { session },
                    retried,
                },
            };
            debug!(attempt, "join suspended until reconnect");
        }
        Vec::new()
    }

    /// Explicit user join. Ignored while an attempt is pending or joined.
    pub fn request_join(&mut self) -> Vec<JoinCommand> {
        match self.state {
            JoinState::PendingRejoin { .. }
            | JoinState::PendingCreateOrJoin { .. }
            | JoinState::Joined(_) => {
                debug!(phase = ?self.phase(), "join already in progress; ignoring request");
                return Vec::new();
            }
            JoinState::NoSession | JoinState::Rejected { .. } => {}
        }

        match self.store.load() {
            Some(session) => self.rejoin_stored(session),
            None => self.begin_fresh(false),
        }
    }

    /// Verify `session` now, or once the transport connects.
    fn rejoin_stored(&mut self, session: Session) -> Vec<JoinCommand> {
        if self.connected {
            return self.begin_verify(session);
        }
        let attempt = self.next_attempt();
        self.state = JoinState::PendingRejoin {
            attempt,
            session,
            stage: RejoinStage::AwaitingConnection,
        };
        Vec::new()
    }

    /// Explicit user clear: wipe the stored player and start over.
    pub fn clear(&mut self) -> Vec<JoinCommand> {
        self.store.clear();
        // Bump the attempt so any in-flight result is stale.
        self.next_attempt();
        self.state = JoinState::NoSession;
        info!("stored session cleared");
        vec![JoinCommand::Notify(Notice::SessionCleared)]
    }

    pub fn on_games_listed(
        &mut self,
        attempt: AttemptId,
        result: Result<Vec<GameSummary>, DirectoryError>,
    ) -> Vec<JoinCommand> {
        match &self.state {
            JoinState::PendingRejoin {
                attempt: current,
                session,
                stage: RejoinStage::VerifyingGame,
            } if *current == attempt => {
                let session = session.clone();
                match result {
                    Ok(games) if games.iter().any(|g| g.game_id == session.game_id) => {
                        if self.connected {
                            self.state = JoinState::PendingRejoin {
                                attempt,
                                session: session.clone(),
                                stage: RejoinStage::AwaitingAck,
                            };
                            vec![JoinCommand::SendJoin { attempt, session }]
                        } else {
                            self.state = JoinState::PendingRejoin {
                                attempt,
                                session,
                                stage: RejoinStage::AwaitingConnection,
                            };
                            Vec::new()
                        }
                    }
                    Ok(_) => {
                        info!(game_id = %session.game_id, "stored game no longer listed; dropping session");
                        self.store.clear();
                        self.state = JoinState::NoSession;
                        vec![JoinCommand::Notify(Notice::SessionExpired {
                            game_id: session.game_id,
                        })]
                    }
                    Err(e) => {
                        warn!("could not verify stored game: {e}");
                        self.state = JoinState::Rejected {
                            session,
                            reason: RejectReason::VerificationFailed,
                        };
                        vec![JoinCommand::Notify(Notice::Failure(e.into()))]
                    }
                }
            }
            JoinState::PendingCreateOrJoin {
                attempt: current,
                stage: FreshStage::Discovering,
                retried,
            } if *current == attempt => {
                let retried = *retried;
                match result {
                    Ok(games) => {
                        let stage = match games.first() {
                            Some(game) => FreshStage::Allocating {
                                game_id: game.game_id.clone(),
                            },
                            None => FreshStage::Creating,
                        };
                        let command = match &stage {
                            FreshStage::Allocating { game_id } => JoinCommand::AllocatePlayer {
                                attempt,
                                game_id: game_id.clone(),
                            },
                            _ => JoinCommand::CreateGame {
                                attempt,
                                name: self.lobby.game_name.clone(),
                                max_players: self.lobby.max_players,
                            },
                        };
                        self.state = JoinState::PendingCreateOrJoin {
                            attempt,
                            stage,
                            retried,
                        };
                        vec![command]
                    }
                    Err(e) => self.fail(e.into()),
                }
            }
            _ => {
                debug!(attempt, "ignoring stale game list");
                Vec::new()
            }
        }
    }

    pub fn on_game_created(
        &mut self,
        attempt: AttemptId,
        result: Result<GameSummary, DirectoryError>,
    ) -> Vec<JoinCommand> {
        let JoinState::PendingCreateOrJoin {
            attempt: current,
            stage: FreshStage::Creating,
            retried,
        } = &self.state
        else {
            debug!(attempt, "ignoring stale create result");
            return Vec::new();
        };
        if *current != attempt {
            debug!(attempt, "ignoring stale create result");
            return Vec::new();
        }
        let retried = *retried;

        match result {
            Ok(game) => {
                info!(game_id = %game.game_id, "created game");
                self.state = JoinState::PendingCreateOrJoin {
                    attempt,
                    stage: FreshStage::Allocating {
                        game_id: game.game_id.clone(),
                    },
                    retried,
                };
                vec![JoinCommand::AllocatePlayer {
                    attempt,
                    game_id: game.game_id,
                }]
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn on_player_allocated(
        &mut self,
        attempt: AttemptId,
        result: Result<PlayerSlot, DirectoryError>,
    ) -> Vec<JoinCommand> {
        let JoinState::PendingCreateOrJoin {
            attempt: current,
            stage: FreshStage::Allocating { game_id },
            retried,
        } = &self.state
        else {
            debug!(attempt, "ignoring stale player allocation");
            return Vec::new();
        };
        if *current != attempt {
            debug!(attempt, "ignoring stale player allocation");
            return Vec::new();
        }
        let (game_id, retried) = (game_id.clone(), *retried);

        match result {
            Ok(slot) => {
                let session = Session::new(game_id, slot.player_id);
                if self.connected {
                    self.state = JoinState::PendingCreateOrJoin {
                        attempt,
                        stage: FreshStage::AwaitingAck {
                            session: session.clone(),
                        },
                        retried,
                    };
                    vec![JoinCommand::SendJoin { attempt, session }]
                } else {
                    self.state = JoinState::PendingCreateOrJoin {
                        attempt,
                        stage: FreshStage::AwaitingConnection { session },
                        retried,
                    };
                    Vec::new()
                }
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// The `join` request could not be sent, or its ack was lost with the link.
    pub fn on_join_undelivered(&mut self, attempt: AttemptId) -> Vec<JoinCommand> {
        let Some(session) = self.state.awaited_ack(attempt).cloned() else {
            return Vec::new();
        };
        debug!(attempt, "join not delivered; waiting for connection");
        self.state = match &self.state {
            JoinState::PendingCreateOrJoin { retried, .. } => JoinState::PendingCreateOrJoin {
                attempt,
                stage: FreshStage::AwaitingConnection { session },
                retried: *retried,
            },
            _ => JoinState::PendingRejoin {
                attempt,
                session,
                stage: RejoinStage::AwaitingConnection,
            },
        };
        Vec::new()
    }

    pub fn on_join_ack(&mut self, attempt: AttemptId, reply: AckReply) -> Vec<JoinCommand> {
        let Some(session) = self.state.awaited_ack(attempt).cloned() else {
            debug!(attempt, "ignoring stale join ack");
            return Vec::new();
        };
        let rejoin = matches!(self.state, JoinState::PendingRejoin { .. });

        if rejoin {
            match self.store.load() {
                Some(stored) if stored == session => {}
                Some(stored) => {
                    debug!(attempt, "stored session changed; verifying the new one");
                    return self.rejoin_stored(stored);
                }
                None => {
                    debug!(attempt, "stored session cleared; dropping join ack");
                    self.next_attempt();
                    self.state = JoinState::NoSession;
                    return Vec::new();
                }
            }
        }

        let Some(message) = reply.error else {
            return self.complete(session, None);
        };

        match classify(reply.code.as_deref(), &message) {
            RejectionKind::Conflict if rejoin => {
                warn!(game_id = %session.game_id, "rejoin rejected: {message}");
                self.state = JoinState::Rejected {
                    session,
                    reason: RejectReason::Conflict,
                };
                vec![JoinCommand::Notify(Notice::Failure(ClientError::JoinConflict(
                    message,
                )))]
            }
            RejectionKind::Conflict => {
                let retried = matches!(
                    self.state,
                    JoinState::PendingCreateOrJoin { retried: true, .. }
                );
                self.store.clear();
                if retried {
                    self.fail(ClientError::JoinConflict(message))
                } else {
                    info!("join conflict on a fresh player; retrying once");
                    self.begin_fresh(true)
                }
            }
            RejectionKind::NotFound => {
                self.store.clear();
                self.fail(ClientError::JoinNotFound(message))
            }
            RejectionKind::Other => self.fail(ClientError::JoinRejected(message)),
        }
    }

    /// A `joined` push. Completes the pending join it confirms.
    pub fn on_joined_event(&mut self, info: JoinedInfo) -> Vec<JoinCommand> {
        let confirmed = Session::new(info.game_id, info.player_id);

        if let JoinState::Joined(identity) = &mut self.state {
            if identity.session == confirmed {
                identity.name = info.name.or(identity.name.take());
            }
            return Vec::new();
        }

        let confirms_pending = self
            .state
            .awaiting_any_ack()
            .is_some_and(|(_, session)| *session == confirmed);
        if confirms_pending {
            self.complete(confirmed, info.name)
        } else {
            debug!(game_id = %confirmed.game_id, "ignoring unrelated joined event");
            Vec::new()
        }
    }

    /// An `error` push.
    pub fn on_server_error(&mut self, message: ServerMessage) -> Vec<JoinCommand> {
        let text = message.text().to_string();
        let ack_pending = self.state.awaiting_any_ack().is_some();

        match classify(message.code.as_deref(), &text) {
            RejectionKind::NotFound => {
                let had_session = self.store.load().is_some();
                self.store.clear();
                match &self.state {
                    JoinState::NoSession if !had_session => {
                        debug!("game-not-found already handled: {text}");
                        Vec::new()
                    }
                    JoinState::PendingCreateOrJoin {
                        stage:
                            FreshStage::Discovering
                            | FreshStage::Creating
                            | FreshStage::Allocating { .. },
                        ..
                    } => {
                        debug!("game-not-found push during create-or-join; session cleared");
                        Vec::new()
                    }
                    _ => {
                        self.next_attempt();
                        self.fail(ClientError::JoinNotFound(text))
                    }
                }
            }
            _ if ack_pending => {
                debug!("server error while a join ack is pending: {text}");
                Vec::new()
            }
            _ => {
                warn!("server error: {text}");
                vec![JoinCommand::Notify(Notice::Failure(
                    ClientError::UnsolicitedServerError(text),
                ))]
            }
        }
    }

    /// The single success transition.
    fn complete(&mut self, session: Session, name: Option<String>) -> Vec<JoinCommand> {
        self.store.save(&session);
        info!(game_id = %session.game_id, player_id = %session.player_id, "joined");
        let identity = Identity { session, name };
        self.state = JoinState::Joined(identity.clone());
        vec![JoinCommand::Notify(Notice::Joined(identity))]
    }
}
