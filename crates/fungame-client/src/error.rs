use crate::directory::DirectoryError;

/// Failures surfaced to the user as notifications.
///
/// Only [`ClientError::JoinConflict`] and [`ClientError::JoinNotFound`] change
/// the join state beyond ending the current attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// No usable connection; the message was dropped.
    #[error("not connected to the game server")]
    TransportUnavailable,

    #[error("directory request failed: {0}")]
    DirectoryRequestFailed(#[from] DirectoryError),

    /// The player is already connected from another client.
    #[error("join rejected: {0}")]
    JoinConflict(String),

    #[error("game not found: {0}")]
    JoinNotFound(String),

    #[error("join failed: {0}")]
    JoinRejected(String),

    /// An `error` push that answered no pending request.
    #[error("server error: {0}")]
    UnsolicitedServerError(String),
}
