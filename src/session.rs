//! Session lifecycle and registry
//!
//! Sessions are process-local; nothing survives a restart. In strict mode
//! (the default) every method except `initialize` must present a known
//! session id. Lenient mode auto-creates sessions on first use so ad-hoc
//! clients can skip the handshake.

use std::time::SystemTime;

use dashmap::DashMap;
use uuid::Uuid;

use crate::{Error, Result};

/// Session id used for auto-created sessions in lenient mode
const AUTO_SESSION_ID: &str = "_auto";

/// A single client session
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session identifier
    pub id: String,
    /// Creation timestamp
    pub created_at: SystemTime,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: SystemTime::now(),
        }
    }
}

/// Process-local session registry
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    require_session: bool,
}

impl SessionRegistry {
    /// Create a registry; `require_session` selects strict mode
    #[must_use]
    pub fn new(require_session: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            require_session,
        }
    }

    /// Allocate a fresh session with a random id
    pub fn create(&self) -> Session {
        let session = Session::new(Uuid::new_v4().to_string());
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Resolve the session id presented by a request.
    ///
    /// Strict mode rejects missing and unknown ids. Lenient mode maps a
    /// missing id to a shared `_auto` session and registers unknown ids on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] in strict mode when the id is missing or
    /// not registered.
    pub fn resolve(&self, session_id: Option<&str>) -> Result<String> {
        let id = match session_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                if self.require_session {
                    return Err(Error::Session("Missing sessionId".to_string()));
                }
                AUTO_SESSION_ID
            }
        };

        if !self.sessions.contains_key(id) {
            if self.require_session {
                return Err(Error::Session(format!("Unknown sessionId '{id}'")));
            }
            self.sessions
                .insert(id.to_string(), Session::new(id.to_string()));
        }

        Ok(id.to_string())
    }

    /// Evict a session; unknown ids are ignored
    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Whether a session id is registered
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
