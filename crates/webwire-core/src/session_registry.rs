//! Server-side session registry (component E).
//!
//! A thread-unsafe `key → set<connection>` mapping, the same shape as the
//! teacher's `ConnectionRegistry` (room subscriptions there, session
//! membership here): a plain struct with `&mut self` methods, made
//! thread-safe by whatever lock the owner (`webwire-server`) wraps it in,
//! per the registry's own lock in the lock order ops → connections →
//! session registry → per-connection.

use std::collections::{HashMap, HashSet};

use crate::error::WebWireError;

/// Opaque per-connection identifier assigned by the server on accept.
pub type ConnectionId = u64;

/// Result of [`SessionRegistry::close_session`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CloseSessionOutcome {
    /// Every connection the session was bound to, regardless of whether
    /// its per-connection closure succeeded.
    pub affected: Vec<ConnectionId>,
    /// One entry per entry in `affected`, in the same order: `None` if
    /// that connection's closure succeeded, `Some(err)` if it failed
    /// (§4.E's `(affected, errors, generalError)` triple).
    pub errors: Vec<(ConnectionId, Option<WebWireError>)>,
}

impl CloseSessionOutcome {
    /// True iff at least one per-connection closure failed (§4.E's
    /// `generalError`).
    #[must_use]
    pub fn has_general_error(&self) -> bool {
        self.errors.iter().any(|(_, err)| err.is_some())
    }
}

/// Maps session keys to the connections currently bound to them.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, HashSet<ConnectionId>>,
    connection_key: HashMap<ConnectionId, String>,
}

impl SessionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `conn` to `key`.
    ///
    /// A connection holds at most one session at a time (§4.D invariant:
    /// "every connection with a non-null session appears in exactly one
    /// entry"); registering a connection already bound elsewhere first
    /// deregisters it from its prior key.
    pub fn register(&mut self, conn: ConnectionId, key: &str) {
        self.deregister(conn);
        self.sessions.entry(key.to_string()).or_default().insert(conn);
        self.connection_key.insert(conn, key.to_string());
    }

    /// Unbind `conn` from whatever session it held, if any.
    ///
    /// Returns the key it was bound to. Removes the session entry
    /// entirely once its connection set becomes empty (invariant:
    /// connection-set is non-empty while the entry exists).
    pub fn deregister(&mut self, conn: ConnectionId) -> Option<String> {
        let key = self.connection_key.remove(&conn)?;
        if let Some(conns) = self.sessions.get_mut(&key) {
            conns.remove(&conn);
            if conns.is_empty() {
                self.sessions.remove(&key);
            }
        }
        Some(key)
    }

    /// True if `key` currently has at least one bound connection.
    #[must_use]
    pub fn is_registered(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// The key `conn` is currently bound to, if any.
    #[must_use]
    pub fn session_for_connection(&self, conn: ConnectionId) -> Option<&str> {
        self.connection_key.get(&conn).map(String::as_str)
    }

    /// Connections currently bound to `key`. Empty if `key` is unknown.
    #[must_use]
    pub fn session_connections(&self, key: &str) -> Vec<ConnectionId> {
        self.sessions.get(key).map(|conns| conns.iter().copied().collect()).unwrap_or_default()
    }

    /// Number of connections bound to `key`.
    #[must_use]
    pub fn session_connections_num(&self, key: &str) -> usize {
        self.sessions.get(key).map_or(0, HashSet::len)
    }

    /// Number of distinct active session keys.
    #[must_use]
    pub fn active_sessions_num(&self) -> usize {
        self.sessions.len()
    }

    /// Close the session `key`: enumerate its connection set as a
    /// snapshot, run `close_one` against each, and unbind every
    /// connection regardless of whether `close_one` succeeded.
    ///
    /// An unknown key returns an empty outcome with no error (§4.E).
    pub fn close_session<F>(&mut self, key: &str, mut close_one: F) -> CloseSessionOutcome
    where
        F: FnMut(ConnectionId) -> Result<(), WebWireError>,
    {
        let Some(conns) = self.sessions.get(key).cloned() else {
            return CloseSessionOutcome::default();
        };

        let mut outcome = CloseSessionOutcome::default();
        for conn in conns {
            outcome.affected.push(conn);
            outcome.errors.push((conn, close_one(conn).err()));
            self.deregister(conn);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut registry = SessionRegistry::new();
        registry.register(1, "alice");
        assert!(registry.is_registered("alice"));
        assert_eq!(registry.session_connections("alice"), vec![1]);
        assert_eq!(registry.session_for_connection(1), Some("alice"));
    }

    #[test]
    fn a_session_may_be_bound_to_multiple_connections() {
        let mut registry = SessionRegistry::new();
        registry.register(1, "alice");
        registry.register(2, "alice");

        let mut conns = registry.session_connections("alice");
        conns.sort_unstable();
        assert_eq!(conns, vec![1, 2]);
        assert_eq!(registry.session_connections_num("alice"), 2);
    }

    #[test]
    fn registering_a_bound_connection_moves_it() {
        let mut registry = SessionRegistry::new();
        registry.register(1, "alice");
        registry.register(1, "bob");

        assert!(!registry.is_registered("alice"));
        assert_eq!(registry.session_connections("bob"), vec![1]);
    }

    #[test]
    fn deregister_removes_empty_entry() {
        let mut registry = SessionRegistry::new();
        registry.register(1, "alice");
        assert_eq!(registry.deregister(1), Some("alice".to_string()));
        assert!(!registry.is_registered("alice"));
        assert_eq!(registry.active_sessions_num(), 0);
    }

    #[test]
    fn deregister_unknown_connection_is_none() {
        let mut registry = SessionRegistry::new();
        assert_eq!(registry.deregister(42), None);
    }

    #[test]
    fn close_session_unknown_key_is_empty_and_errorless() {
        let mut registry = SessionRegistry::new();
        let outcome = registry.close_session("nope", |_| Ok(()));
        assert!(outcome.affected.is_empty());
        assert!(!outcome.has_general_error());
    }

    #[test]
    fn close_session_unbinds_every_connection_and_reports_failures() {
        let mut registry = SessionRegistry::new();
        registry.register(1, "alice");
        registry.register(2, "alice");

        let outcome = registry.close_session("alice", |conn| {
            if conn == 2 {
                Err(WebWireError::Transport("boom".to_string()))
            } else {
                Ok(())
            }
        });

        let mut affected = outcome.affected.clone();
        affected.sort_unstable();
        assert_eq!(affected, vec![1, 2]);
        assert_eq!(outcome.errors.len(), 2);
        let failed: Vec<_> = outcome.errors.iter().filter(|(_, err)| err.is_some()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 2);
        assert!(outcome.has_general_error());
        assert!(!registry.is_registered("alice"));
        assert_eq!(registry.session_for_connection(1), None);
        assert_eq!(registry.session_for_connection(2), None);
    }

    #[test]
    fn active_sessions_num_counts_distinct_keys() {
        let mut registry = SessionRegistry::new();
        registry.register(1, "alice");
        registry.register(2, "alice");
        registry.register(3, "bob");
        assert_eq!(registry.active_sessions_num(), 2);
    }
}
