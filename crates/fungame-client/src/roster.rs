//! Plain-text player roster and turn line.

use std::fmt::Write;

use crate::model::GameState;

/// Render the roster with the local player first.
///
/// ```text
/// Players:
/// → Brave Fox (You): HP 7/10, Pos (3,4), Score: 2
///    Swift Owl: HP 10/10, Pos (0,0), Score: 0
/// Current Turn: Swift Owl
/// ```
pub fn roster(state: &GameState, local_player_id: Option<&str>) -> String {
    let mut players: Vec<_> = state.players.iter().collect();
    if let Some(me) = local_player_id
        && let Some(idx) = players.iter().position(|p| p.id == me)
    {
        let mine = players.remove(idx);
        players.insert(0, mine);
    }

    let mut out = String::from("Players:\n");
    for p in players {
        let is_me = local_player_id == Some(p.id.as_str());
        let _ = writeln!(
            out,
            "{}{}{}: HP {}/{}, Pos ({},{}), Score: {}",
            if is_me { "→ " } else { "   " },
            p.name,
            if is_me { " (You)" } else { "" },
            p.hp,
            p.max_hp,
            p.position.x,
            p.position.y,
            p.score,
        );
    }

    let turn = match &state.current_turn {
        None => "None",
        Some(_) => state
            .current_player()
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown"),
    };
    let _ = write!(out, "Current Turn: {turn}");
    out
}
