//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Session registry
//!
//! The registry is the single authority on who is in the chat. It is responsible for:
//! - Admitting sessions under a unique identity
//! - Removing sessions when their workers finish
//! - Handing out consistent snapshots for broadcasts
//!
//! All operations take one short lock over a single map, so every admit, removal and
//! snapshot is linearizable with respect to the others. The lock is never held across
//! I/O or an `.await`.

use crate::{RelayError, Result, Session, SessionState};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// Registry of active sessions keyed by identity
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    limit: Option<usize>,
}

impl SessionRegistry {
    /// Create an empty, unbounded registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that holds at most `limit` sessions
    pub fn with_limit(limit: usize) -> Self {
        Self {
            sessions: RwLock::default(),
            limit: Some(limit),
        }
    }

    /// Get the session limit, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Check whether the registry is at its session limit
    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.len() >= limit)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a session under its identity
    ///
    /// The uniqueness check and the insert happen under one lock: of several concurrent
    /// admits for the same identity exactly one succeeds. A rejected admit leaves the
    /// registry untouched. On success the session becomes `Active`.
    ///
    /// A bounded registry refuses admits beyond its limit with
    /// [`RelayError::MaxConnectionsReached`].
    pub fn admit(&self, session: Session) -> Result<Arc<Session>> {
        let mut sessions = self.write();
        if sessions.contains_key(session.identity()) {
            trace!(identity = session.identity(), "Identity already registered");
            return Err(RelayError::DuplicateIdentity(session.identity().to_string()));
        }
        if let Some(limit) = self.limit.filter(|&limit| sessions.len() >= limit) {
            trace!(identity = session.identity(), limit, "Registry is full");
            return Err(RelayError::MaxConnectionsReached(limit));
        }

        session.set_state(SessionState::Active);
        let session = Arc::new(session);
        sessions.insert(session.identity().to_string(), session.clone());
        debug!(
            session_id = %session.id(),
            identity = session.identity(),
            active = sessions.len(),
            "Session admitted"
        );
        Ok(session)
    }

    /// Remove whichever session holds `identity`
    ///
    /// Removing an absent identity is a no-op and returns `None`.
    pub fn remove(&self, identity: &str) -> Option<Arc<Session>> {
        let removed = self.write().remove(identity);
        if let Some(session) = &removed {
            debug!(session_id = %session.id(), identity, "Session removed");
        }
        removed
    }

    /// Remove `session` only if it still holds its identity
    ///
    /// Returns true if this call removed it. A stale handle never evicts a newer session
    /// that has since taken the same identity.
    pub fn release(&self, session: &Session) -> bool {
        let mut sessions = self.write();
        match sessions.get(session.identity()) {
            Some(current) if current.id() == session.id() => {
                sessions.remove(session.identity());
                debug!(
                    session_id = %session.id(),
                    identity = session.identity(),
                    active = sessions.len(),
                    "Session released"
                );
                true
            }
            _ => false,
        }
    }

    /// Point-in-time copy of all active sessions, in admission order
    ///
    /// The returned vector is unaffected by admits and removals made after the call.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        let mut snapshot: Vec<Arc<Session>> = self.read().values().cloned().collect();
        snapshot.sort_by_key(|session| session.id());
        snapshot
    }

    /// Look up the session holding `identity`
    pub fn get(&self, identity: &str) -> Option<Arc<Session>> {
        self.read().get(identity).cloned()
    }

    /// Check whether `identity` is currently held
    pub fn contains(&self, identity: &str) -> bool {
        self.read().contains_key(identity)
    }

    /// Identities of all active sessions, in admission order
    pub fn identities(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|session| session.identity().to_string())
            .collect()
    }

    /// Get the number of active sessions
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check whether no sessions are active
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("session_count", &self.len())
            .finish()
    }
}
