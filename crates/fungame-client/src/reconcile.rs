//! Local copy of the latest game snapshot.
//!
//! Every snapshot replaces the previous one wholesale. A snapshot that carries
//! a sequence number no newer than the last applied one for the same game is
//! dropped, so out-of-order delivery cannot roll the view back.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::model::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Older than (or equal to) the last applied snapshot of this game.
    Stale,
}

/// Holds the latest [`GameState`] and publishes it to watchers.
pub struct StateView {
    tx: watch::Sender<Option<Arc<GameState>>>,
}

impl Default for StateView {
    fn default() -> Self {
        Self::new()
    }
}

impl StateView {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the local state with `snapshot` unless it is stale.
    pub fn apply(&self, snapshot: GameState) -> ApplyOutcome {
        if let Some(current) = self.tx.borrow().as_deref()
            && current.id == snapshot.id
            && let (Some(last), Some(incoming)) = (current.seq, snapshot.seq)
            && incoming <= last
        {
            debug!(game_id = %snapshot.id, last, incoming, "dropping stale snapshot");
            return ApplyOutcome::Stale;
        }

        self.tx.send_replace(Some(Arc::new(snapshot)));
        ApplyOutcome::Applied
    }

    /// The latest applied snapshot.
    pub fn latest(&self) -> Option<Arc<GameState>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<GameState>>> {
        self.tx.subscribe()
    }

    /// Forget the current snapshot.
    pub fn reset(&self) {
        self.tx.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Player, Position};

    fn player(id: &str, hp: i32, x: i32) -> Player {
        Player {
            id: id.to_string(),
            name: id.to_uppercase(),
            color: 0x00ff00,
            hp,
            max_hp: 10,
            position: Position::new(x, 0),
            score: 0,
            ac: 10,
            initiative: 0,
            is_connected: true,
        }
    }

    fn snapshot(id: &str, seq: Option<u64>, players: Vec<Player>) -> GameState {
        GameState {
            id: id.to_string(),
            name: String::new(),
            status: Default::default(),
            map: Vec::new(),
            players,
            monsters: Vec::new(),
            current_turn: None,
            turn_queue: Vec::new(),
            seq,
        }
    }

    #[test]
    fn test_second_snapshot_replaces_first_entirely() {
        let view = StateView::new();
        let mut s1 = snapshot("g1", None, vec![player("p1", 10, 0), player("p2", 10, 1)]);
        s1.current_turn = Some("p1".into());
        let s2 = snapshot("g1", None, vec![player("p1", 4, 3)]);

        view.apply(s1);
        view.apply(s2.clone());

        assert_eq!(*view.latest().unwrap(), s2);
    }

    #[test]
    fn test_older_sequence_is_dropped() {
        let view = StateView::new();
        view.apply(snapshot("g1", Some(5), vec![player("p1", 10, 5)]));

        assert_eq!(
            view.apply(snapshot("g1", Some(4), vec![player("p1", 10, 4)])),
            ApplyOutcome::Stale
        );
        assert_eq!(
            view.apply(snapshot("g1", Some(5), Vec::new())),
            ApplyOutcome::Stale
        );
        assert_eq!(view.latest().unwrap().players[0].position.x, 5);

        assert_eq!(
            view.apply(snapshot("g1", Some(6), Vec::new())),
            ApplyOutcome::Applied
        );
    }

    #[test]
    fn test_unsequenced_and_other_games_always_apply() {
        let view = StateView::new();
        view.apply(snapshot("g1", Some(9), Vec::new()));

        assert_eq!(view.apply(snapshot("g1", None, Vec::new())), ApplyOutcome::Applied);
        view.apply(snapshot("g1", Some(9), Vec::new()));
        assert_eq!(view.apply(snapshot("g2", Some(1), Vec::new())), ApplyOutcome::Applied);
        assert_eq!(view.latest().unwrap().id, "g2");
    }

    #[tokio::test]
    async fn test_watchers_see_each_applied_snapshot() {
        let view = StateView::new();
        let mut rx = view.subscribe();

        view.apply(snapshot("g1", Some(1), Vec::new()));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().seq, Some(1));

        view.reset();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
