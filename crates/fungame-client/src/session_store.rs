//! Persistence of the `{gameId, playerId}` pair for one client profile.
//!
//! Storage problems never reach the caller: they are logged and the store
//! behaves as if it held no session.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::model::Session;

/// Storage for at most one [`Session`].
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session);
    fn load(&self) -> Option<Session>;
    fn clear(&self);
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn save(&self, session: &Session) {
        (**self).save(session)
    }

    fn load(&self) -> Option<Session> {
        (**self).load()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// Process-local store; the session lives as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) {
        match self.slot.lock() {
            Ok(mut slot) => *slot = Some(session.clone()),
            Err(_) => warn!("session store lock poisoned; session not saved"),
        }
    }

    fn load(&self) -> Option<Session> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// A profile name that cannot be used as a file name inside the sessions directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session profile `{0}`: it must be a plain file name")]
pub struct InvalidProfile(pub String);

/// One JSON file per profile: `<dir>/<profile>.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Fails when `profile` is empty, starts with `.`, or contains a path
    /// separator.
    pub fn new(dir: &Path, profile: &str) -> Result<Self, InvalidProfile> {
        if profile.is_empty()
            || profile.starts_with('.')
            || profile.contains(['/', '\\', ':', '\0'])
        {
            return Err(InvalidProfile(profile.to_string()));
        }
        Ok(Self {
            path: dir.join(format!("{profile}.json")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) {
        if let Some(parent) = self.path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), "cannot create session directory: {e}");
            return;
        }

        let bytes = match serde_json::to_vec_pretty(session) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("cannot encode session: {e}");
                return;
            }
        };

        match std::fs::write(&self.path, bytes) {
            Ok(()) => debug!(path = %self.path.display(), game_id = %session.game_id, "session saved"),
            Err(e) => warn!(path = %self.path.display(), "cannot write session: {e}"),
        }
    }

    fn load(&self) -> Option<Session> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "cannot read session: {e}");
                return None;
            }
        };

        serde_json::from_slice(&bytes)
            .inspect_err(|e| warn!(path = %self.path.display(), "ignoring corrupt session file: {e}"))
            .ok()
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "session cleared"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "cannot remove session: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load(), None);

        store.save(&Session::new("g1", "p1"));
        assert_eq!(store.load(), Some(Session::new("g1", "p1")));

        store.save(&Session::new("g2", "p2"));
        assert_eq!(store.load(), Some(Session::new("g2", "p2")));

        store.clear();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_round_trip_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(&dir.path().join("sessions"), "tab-1").unwrap();

        store.save(&Session::new("g1", "p1"));
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"gameId\"") && raw.contains("\"playerId\""), "{raw}");

        let reopened = FileSessionStore::new(&dir.path().join("sessions"), "tab-1").unwrap();
        assert_eq!(reopened.load(), Some(Session::new("g1", "p1")));
    }

    #[test]
    fn test_profiles_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileSessionStore::new(dir.path(), "a").unwrap();
        let b = FileSessionStore::new(dir.path(), "b").unwrap();

        a.save(&Session::new("g1", "p1"));
        assert_eq!(b.load(), None);
        b.clear();
        assert!(a.load().is_some());
    }

    #[test]
    fn test_profile_cannot_escape_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = dir.path().join("sessions");
        for profile in ["../x", "a/b", "a\\b", "..", ".hidden", "", "c:x"] {
            assert_eq!(
                FileSessionStore::new(&sessions, profile).unwrap_err(),
                InvalidProfile(profile.to_string())
            );
        }

        let store = FileSessionStore::new(&sessions, "tab-2.v1").unwrap();
        assert_eq!(store.path(), sessions.join("tab-2.v1.json"));
    }

    #[test]
    fn test_corrupt_file_reads_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path(), "default").unwrap();
        std::fs::write(store.path(), b"{\"gameId\": 12").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_unwritable_location_degrades_silently() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();

        let store = FileSessionStore::new(&blocker, "default").unwrap();
        store.save(&Session::new("g1", "p1"));
        assert_eq!(store.load(), None);
        store.clear();
    }

    #[test]
    fn test_clear_without_file_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path(), "default").unwrap();
        store.clear();
        assert_eq!(store.load(), None);
    }
}
