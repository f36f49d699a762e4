//! Observable connection state of the transport supervisor.

use tokio::sync::watch;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Trying the configured transports, or waiting out a backoff delay.
    Connecting,
    /// A link is up and envelopes can be sent.
    Connected,
    /// No link, and the supervisor has stopped trying.
    Disconnected,
}

/// Observable connection state backed by a [`watch`] channel.
///
/// Multiple subscribers can observe state transitions without polling.
#[derive(Debug)]
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
    rx: watch::Receiver<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current connection state, notifying subscribers on change.
    pub fn set(&self, state: ConnectionState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current() == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let watch = ConnectionStateWatch::new();
        assert_eq!(watch.current(), ConnectionState::Disconnected);
        assert!(!watch.is_connected());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let watch = ConnectionStateWatch::new();
        let mut rx = watch.subscribe();

        watch.set(ConnectionState::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);

        watch.set(ConnectionState::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);
    }

    #[test]
    fn test_repeated_state_does_not_notify() {
        let watch = ConnectionStateWatch::new();
        let mut rx = watch.subscribe();
        rx.mark_unchanged();

        watch.set(ConnectionState::Disconnected);
        assert!(!rx.has_changed().unwrap());
    }
}
