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

//! Broadcast dispatcher
//!
//! The Dispatcher fans a message out to every active session, optionally skipping the
//! session it came from. Delivery means queueing the frame on each recipient's outbound
//! queue; the recipient's worker performs the write. Because queueing never waits,
//! the dispatcher can take one global lock around snapshot-and-enqueue, which gives
//! every recipient the same relative order of broadcasts without any network I/O under
//! the lock.

use crate::{OutboundMessage, RelayError, Result, ServerMetrics, Session, SessionId, SessionRegistry};
use metrics::counter;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{trace, warn};

/// Result of a broadcast operation
#[derive(Debug, Clone, Default)]
pub struct BroadcastResult {
    /// Total number of sessions attempted
    pub total: usize,
    /// Number of successful deliveries
    pub succeeded: usize,
    /// Number of failed deliveries
    pub failed: usize,
    /// Errors that occurred (SessionId and error message)
    pub errors: Vec<(SessionId, String)>,
}

impl BroadcastResult {
    /// Check if all deliveries succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Get the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}

/// Fans messages out to the sessions in a [`SessionRegistry`]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    metrics: Arc<ServerMetrics>,
    /// Single ordering point for all broadcasts
    order: Mutex<()>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`
    pub fn new(registry: Arc<SessionRegistry>, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            registry,
            metrics,
            order: Mutex::new(()),
        }
    }

    /// Get the registry this dispatcher reads from
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver `message` to every active session except `exclude`
    ///
    /// A failed delivery is recorded in the result and asks the failing session to
    /// close; its own worker removes it and announces the departure. The remaining
    /// recipients are still served. With no active sessions this does nothing.
    pub fn broadcast(&self, message: &OutboundMessage, exclude: Option<SessionId>) -> BroadcastResult {
        let mut result = BroadcastResult::default();
        let _order = self.order.lock().unwrap_or_else(PoisonError::into_inner);

        let recipients = self.registry.snapshot();
        if recipients.is_empty() {
            return result;
        }

        counter!("parley.broadcasts").increment(1);
        self.metrics.broadcast();

        for session in recipients.iter().filter(|s| Some(s.id()) != exclude) {
            result.total += 1;
            match session.deliver(message.payload().clone()) {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    self.record_failure(session, &e);
                    result.failed += 1;
                    result.errors.push((session.id(), e.to_string()));
                }
            }
        }

        trace!(
            kind = ?message.kind(),
            recipients = result.total,
            failed = result.failed,
            "Broadcast dispatched"
        );
        result
    }

    /// Deliver `message` to a single session
    pub fn send_to(&self, session: &Session, message: &OutboundMessage) -> Result<()> {
        session.deliver(message.payload().clone()).inspect_err(|e| {
            self.record_failure(session, e);
        })
    }

    fn record_failure(&self, session: &Session, error: &RelayError) {
        counter!("parley.delivery.failures").increment(1);
        self.metrics.delivery_failure();
        warn!(
            session_id = %session.id(),
            identity = session.identity(),
            error = %error,
            "Message was not delivered"
        );
        // A recipient that cannot keep up is dropped rather than allowed to stall the room.
        if matches!(error, RelayError::DeliveryFailed { .. }) {
            session.close();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("session_count", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionInbox, message};
    use tokio_util::sync::CancellationToken;

    struct Room {
        registry: Arc<SessionRegistry>,
        dispatcher: Dispatcher,
        shutdown: CancellationToken,
        next_id: u64,
    }

    impl Room {
        fn new() -> Self {
            let registry = Arc::new(SessionRegistry::new());
            let dispatcher = Dispatcher::new(registry.clone(), Arc::new(ServerMetrics::new()));
            Self {
                registry,
                dispatcher,
                shutdown: CancellationToken::new(),
                next_id: 1,
            }
        }

        fn join(&mut self, identity: &str, queue_size: usize) -> (Arc<Session>, SessionInbox) {
            let id = SessionId::new(self.next_id);
            self.next_id += 1;
            let (session, inbox) = Session::new(id, identity, None, queue_size, &self.shutdown);
            (self.registry.admit(session).unwrap(), inbox)
        }
    }

    fn drain(inbox: &mut SessionInbox) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(payload) = inbox.try_recv() {
            messages.push(String::from_utf8_lossy(&payload).into_owned());
        }
        messages
    }

    #[test]
    fn test_broadcast_excludes_origin() {
        let mut room = Room::new();
        let (alice, mut alice_inbox) = room.join("alice", 8);
        let (_bob, mut bob_inbox) = room.join("bob", 8);
        let (_carol, mut carol_inbox) = room.join("carol", 8);

        let message = OutboundMessage::chat(alice.id(), alice.identity(), "hello");
        let result = room.dispatcher.broadcast(&message, Some(alice.id()));

        assert_eq!(result.total, 2);
        assert!(result.all_succeeded());
        assert_eq!(drain(&mut bob_inbox), vec!["alice: hello"]);
        assert_eq!(drain(&mut carol_inbox), vec!["alice: hello"]);
        assert!(drain(&mut alice_inbox).is_empty());
    }

    #[test]
    fn test_system_broadcast_reaches_everyone() {
        let mut room = Room::new();
        let (_alice, mut alice_inbox) = room.join("alice", 8);
        let (_bob, mut bob_inbox) = room.join("bob", 8);

        let notice = OutboundMessage::system(message::joined_notice("bob"));
        let result = room.dispatcher.broadcast(&notice, None);

        assert_eq!(result.total, 2);
        assert_eq!(drain(&mut alice_inbox), vec!["Server: bob joined the chat!"]);
        assert_eq!(drain(&mut bob_inbox), vec!["Server: bob joined the chat!"]);
    }

    #[test]
    fn test_broadcast_with_no_sessions() {
        let room = Room::new();
        let result = room.dispatcher.broadcast(&OutboundMessage::system("anyone?"), None);

        assert_eq!(result.total, 0);
        assert!(result.all_succeeded());
        assert_eq!(result.success_rate(), 100.0);
    }

    #[test]
    fn test_failed_recipient_does_not_abort_fanout() {
        let mut room = Room::new();
        let (alice, _alice_inbox) = room.join("alice", 8);
        let (slow, _slow_inbox) = room.join("slow", 1);
        let (_carol, mut carol_inbox) = room.join("carol", 8);

        room.dispatcher
            .broadcast(&OutboundMessage::chat(alice.id(), "alice", "one"), Some(alice.id()));
        let result = room
            .dispatcher
            .broadcast(&OutboundMessage::chat(alice.id(), "alice", "two"), Some(alice.id()));

        assert_eq!(result.total, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].0, slow.id());
        assert!(slow.is_close_requested());
        assert_eq!(drain(&mut carol_inbox), vec!["alice: one", "alice: two"]);
    }

    #[test]
    fn test_send_to_single_session() {
        let mut room = Room::new();
        let (alice, mut alice_inbox) = room.join("alice", 8);
        let (_bob, mut bob_inbox) = room.join("bob", 8);

        room.dispatcher
            .send_to(&alice, &OutboundMessage::system(message::welcome_notice()))
            .unwrap();

        assert_eq!(drain(&mut alice_inbox).len(), 1);
        assert!(drain(&mut bob_inbox).is_empty());
    }

    #[test]
    fn test_concurrent_broadcasts_share_one_order() {
        let mut room = Room::new();
        let (_a, mut a_inbox) = room.join("a", 1024);
        let (_b, mut b_inbox) = room.join("b", 1024);
        let (_c, mut c_inbox) = room.join("c", 1024);
        let dispatcher = Arc::new(room.dispatcher);

        let handles: Vec<_> = (0..4)
            .map(|sender| {
                let dispatcher = dispatcher.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let text = format!("{}-{}", sender, i);
                        dispatcher.broadcast(&OutboundMessage::system(text), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let a = drain(&mut a_inbox);
        let b = drain(&mut b_inbox);
        let c = drain(&mut c_inbox);
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }
}
