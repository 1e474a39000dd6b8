//! Per-connection session state

use crate::Prefix;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle.
///
/// Transitions only move forward: `Unregistered -> Registered -> Closed`,
/// or straight from `Unregistered` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for NICK and USER
    Unregistered,
    /// Fully registered
    Registered,
    /// Torn down; no further commands are processed
    Closed,
}

/// Identity and state of one connected client
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    /// Peer address, used as the host part of the prefix
    host: String,
    nick: Option<String>,
    username: Option<String>,
    realname: Option<String>,
    connected_at: DateTime<Utc>,
    registered_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new unregistered session
    pub fn new(id: SessionId, host: String) -> Self {
        Self {
            id,
            state: SessionState::Unregistered,
            host,
            nick: None,
            username: None,
            realname: None,
            connected_at: Utc::now(),
            registered_at: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state == SessionState::Registered
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn realname(&self) -> Option<&str> {
        self.realname.as_deref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    /// Target parameter for numeric replies: the nickname, or `*` before one is set
    pub fn target(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    /// Whether both NICK and USER have been supplied
    pub fn has_identity(&self) -> bool {
        self.nick.is_some() && self.username.is_some()
    }

    /// `nick!user@host` prefix for relayed events
    pub fn prefix(&self) -> Prefix {
        Prefix::User {
            nick: self.target().to_string(),
            user: self.username.clone().unwrap_or_else(|| "*".to_string()),
            host: self.host.clone(),
        }
    }

    pub(crate) fn set_nick(&mut self, nick: String) {
        self.nick = Some(nick);
    }

    pub(crate) fn set_user(&mut self, username: String, realname: String) {
        self.username = Some(username);
        self.realname = Some(realname);
    }

    /// Move to `Registered`. Returns false if the session is not unregistered.
    pub(crate) fn mark_registered(&mut self) -> bool {
        if self.state != SessionState::Unregistered {
            return false;
        }
        self.state = SessionState::Registered;
        self.registered_at = Some(Utc::now());
        true
    }

    /// Move to `Closed`. Returns false if already closed.
    pub(crate) fn mark_closed(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = Session::new(SessionId::new(), "127.0.0.1".to_string());
        assert_eq!(session.state(), SessionState::Unregistered);
        assert_eq!(session.target(), "*");
        assert!(!session.has_identity());

        session.set_nick("alice".to_string());
        session.set_user("a".to_string(), "Alice".to_string());
        assert!(session.has_identity());
        assert!(session.mark_registered());
        assert!(!session.mark_registered());
        assert!(session.registered_at().is_some());

        assert!(session.mark_closed());
        assert!(!session.mark_closed());
        assert!(session.is_closed());
    }

    #[test]
    fn test_prefix() {
        let mut session = Session::new(SessionId::new(), "10.0.0.1".to_string());
        session.set_nick("bob".to_string());
        session.set_user("b".to_string(), "Bob".to_string());
        assert_eq!(session.prefix().to_string(), "bob!b@10.0.0.1");
    }

    #[test]
    fn test_closed_from_unregistered() {
        let mut session = Session::new(SessionId::new(), "::1".to_string());
        assert!(session.mark_closed());
        assert!(!session.mark_registered());
    }
}
