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

//! Per-participant session state

use crate::{RelayError, Result, SessionId, SessionState};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Receiving end of a session's outbound queue, drained by its worker
pub type SessionInbox = mpsc::Receiver<Bytes>;

/// The server-side record of one connected participant
///
/// A session does not hold its connection; the worker owns that. Everything else
/// reaches the client by queueing frames with [`deliver`](Self::deliver), which never
/// blocks and preserves the order in which frames were queued.
pub struct Session {
    id: SessionId,
    identity: String,
    peer_addr: Option<SocketAddr>,
    outbound: mpsc::Sender<Bytes>,
    state: AtomicU8,
    close_token: CancellationToken,
    created_at: Instant,
}

impl Session {
    /// Create a session in the `Connecting` state
    ///
    /// `shutdown` is the server-wide token; cancelling it closes every session created
    /// from it.
    pub fn new(
        id: SessionId,
        identity: impl Into<String>,
        peer_addr: Option<SocketAddr>,
        queue_size: usize,
        shutdown: &CancellationToken,
    ) -> (Self, SessionInbox) {
        let (outbound, inbox) = mpsc::channel(queue_size.max(1));
        let session = Self {
            id,
            identity: identity.into(),
            peer_addr,
            outbound,
            state: AtomicU8::new(SessionState::Connecting.as_u8()),
            close_token: shutdown.child_token(),
            created_at: Instant::now(),
        };
        (session, inbox)
    }

    /// Get the session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the participant's display name
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Get the peer address, when the transport has one
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Get when the session was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Check if the session is active
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Atomically move from `from` to `to`; returns false if the state was not `from`
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Queue a frame for this session's client
    ///
    /// Fails without waiting when the session is no longer active, its worker has
    /// gone, or its queue is full.
    pub fn deliver(&self, payload: Bytes) -> Result<()> {
        if !self.is_active() {
            return Err(RelayError::ConnectionClosed);
        }
        match self.outbound.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RelayError::DeliveryFailed {
                session: self.id,
                reason: "outbound queue full".to_string(),
            }),
            Err(TrySendError::Closed(_)) => Err(RelayError::ConnectionClosed),
        }
    }

    /// Ask the session's worker to terminate
    ///
    /// The worker performs the actual teardown; calling this more than once is harmless.
    pub fn close(&self) {
        self.close_token.cancel();
    }

    /// Check whether the session has been asked to close
    pub fn is_close_requested(&self) -> bool {
        self.close_token.is_cancelled()
    }

    /// Resolves once the session has been asked to close
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.close_token.cancelled()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
