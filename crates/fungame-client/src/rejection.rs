//! Classification of server error replies.
//!
//! The server reports join failures as free text. This module is the only
//! place that looks inside those strings; a structured `code`, when the server
//! sends one, always wins.

/// Structured code for a player that is already connected elsewhere.
pub const CODE_PLAYER_ALREADY_CONNECTED: &str = "player_already_connected";
/// Structured code for a game the server does not know.
pub const CODE_GAME_NOT_FOUND: &str = "game_not_found";

/// What a server error means for the join protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// The player is already connected from another client.
    Conflict,
    /// The game no longer exists.
    NotFound,
    Other,
}

/// Classify an error reply by its optional code, falling back to its message.
pub fn classify(code: Option<&str>, message: &str) -> RejectionKind {
    match code {
        Some(CODE_PLAYER_ALREADY_CONNECTED) => return RejectionKind::Conflict,
        Some(CODE_GAME_NOT_FOUND) => return RejectionKind::NotFound,
        _ => {}
    }

    let normalized = message.to_lowercase().replace('_', " ");
    if normalized.contains("player already") {
        RejectionKind::Conflict
    } else if normalized.contains("game not found") {
        RejectionKind::NotFound
    } else {
        RejectionKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_matching() {
        assert_eq!(classify(None, "player_already: x"), RejectionKind::Conflict);
        assert_eq!(classify(None, "player already connected"), RejectionKind::Conflict);
        assert_eq!(classify(None, "game not found"), RejectionKind::NotFound);
        assert_eq!(classify(None, "Game Not Found"), RejectionKind::NotFound);
        assert_eq!(classify(None, "gameId and playerId required"), RejectionKind::Other);
        assert_eq!(classify(None, ""), RejectionKind::Other);
    }

    #[test]
    fn test_code_wins_over_message() {
        assert_eq!(
            classify(Some("game_not_found"), "player already connected"),
            RejectionKind::NotFound
        );
        assert_eq!(
            classify(Some("player_already_connected"), "whatever"),
            RejectionKind::Conflict
        );
    }

    #[test]
    fn test_unknown_code_falls_back_to_message() {
        assert_eq!(classify(Some("rate_limited"), "game not found"), RejectionKind::NotFound);
    }
}
