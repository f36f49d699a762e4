//! Local checks applied before an action goes on the wire.

use crate::model::{Action, ActionEnvelope, GameState, Identity, Session};

/// Why an action was not sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRefusal {
    #[error("no local player")]
    NoLocalPlayer,

    #[error("no target game")]
    NoTargetGame,

    #[error("local player is not in the current game state")]
    PlayerAbsent,

    #[error("local player is dead")]
    PlayerDead,

    #[error("cannot attack yourself")]
    SelfTarget,
}

/// Resolve ids and check the local player before sending `action`.
///
/// The player id comes from the stored session, else the adopted identity.
/// The game id comes from `game_override`, else the latest state, else the
/// adopted identity. `respawn` skips the liveness checks.
pub fn authorize(
    action: Action,
    game_override: Option<&str>,
    stored: Option<&Session>,
    adopted: Option<&Identity>,
    latest: Option<&GameState>,
) -> Result<ActionEnvelope, GateRefusal> {
    let player_id = stored
        .map(|s| s.player_id.as_str())
        .or(adopted.map(Identity::player_id))
        .ok_or(GateRefusal::NoLocalPlayer)?;

    let game_id = game_override
        .or(latest.map(|s| s.id.as_str()))
        .or(adopted.map(Identity::game_id))
        .ok_or(GateRefusal::NoTargetGame)?;

    if !action.is_respawn() {
        let me = latest
            .and_then(|state| state.player(player_id))
            .ok_or(GateRefusal::PlayerAbsent)?;
        if !me.is_alive() {
            return Err(GateRefusal::PlayerDead);
        }
        if let Action::Attack { target_id } = &action
            && target_id == player_id
        {
            return Err(GateRefusal::SelfTarget);
        }
    }

    Ok(ActionEnvelope {
        game_id: game_id.to_string(),
        player_id: player_id.to_string(),
        action,
    })
}
