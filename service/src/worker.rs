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

//! Session worker implementation
//!
//! The SessionWorker is responsible for the lifecycle of a single admitted session,
//! including:
//! - Reading chat frames from the client and broadcasting them
//! - Writing queued messages to the client
//! - Timeout management (idle, write)
//! - Teardown: removal from the registry and the departure notice

use crate::message::{self, OutboundMessage};
use crate::{
    DepartureReason, Dispatcher, RelayConnection, RelayHandler, ServerMetrics, Session,
    SessionInbox, SessionRegistry, SessionState,
};
use bytes::Bytes;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, instrument, trace};

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Idle timeout (max time without traffic in either direction)
    pub idle_timeout: Option<Duration>,
    /// Write timeout (max time for one send to the client)
    pub write_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Worker that runs one admitted session until it departs
pub struct SessionWorker {
    session: Arc<Session>,
    connection: RelayConnection,
    inbox: SessionInbox,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
    handler: Arc<dyn RelayHandler>,
    metrics: Arc<ServerMetrics>,
    config: WorkerConfig,
    last_activity: Instant,
}

impl SessionWorker {
    /// Create a worker for an admitted session
    pub fn new(
        session: Arc<Session>,
        connection: RelayConnection,
        inbox: SessionInbox,
        dispatcher: Arc<Dispatcher>,
        handler: Arc<dyn RelayHandler>,
        metrics: Arc<ServerMetrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            session,
            connection,
            inbox,
            registry: dispatcher.registry().clone(),
            dispatcher,
            handler,
            metrics,
            config,
            last_activity: Instant::now(),
        }
    }

    /// Get the session this worker runs
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run the worker until the session departs
    ///
    /// Teardown always runs before this returns, whatever ended the session.
    #[instrument(
        name = "session",
        skip(self),
        fields(session_id = %self.session.id(), identity = self.session.identity())
    )]
    pub async fn run(mut self) -> DepartureReason {
        let reason = self.event_loop().await;
        self.terminate(&reason).await;
        reason
    }

    async fn event_loop(&mut self) -> DepartureReason {
        loop {
            let idle_deadline = self.config.idle_timeout.map(|idle| self.last_activity + idle);
            let idle = async move {
                match idle_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            select! {
                biased;

                _ = self.session.closed() => {
                    return DepartureReason::Closed;
                }

                queued = self.inbox.recv() => {
                    match queued {
                        Some(payload) => {
                            if let Err(reason) = self.write(payload).await {
                                return reason;
                            }
                        }
                        None => return DepartureReason::Closed,
                    }
                }

                received = self.connection.receive() => {
                    match received {
                        Ok(Some(payload)) => {
                            self.last_activity = Instant::now();
                            if let Some(reason) = self.handle_frame(payload).await {
                                return reason;
                            }
                        }
                        Ok(None) => return DepartureReason::Disconnected,
                        Err(e) => return DepartureReason::ReadFailed(e.to_string()),
                    }
                }

                _ = idle => {
                    return DepartureReason::IdleTimeout;
                }
            }
        }
    }

    async fn write(&mut self, payload: Bytes) -> Result<(), DepartureReason> {
        match timeout(self.config.write_timeout, self.connection.send(payload)).await {
            Ok(Ok(())) => {
                self.last_activity = Instant::now();
                Ok(())
            }
            Ok(Err(e)) => Err(DepartureReason::WriteFailed(e.to_string())),
            Err(_) => Err(DepartureReason::WriteFailed("write timed out".to_string())),
        }
    }

    /// Process one frame from the client; returns a reason when the session should end
    async fn handle_frame(&mut self, payload: Bytes) -> Option<DepartureReason> {
        if payload.is_empty() {
            trace!("Ignoring empty frame");
            return None;
        }

        let text = String::from_utf8_lossy(&payload);
        if message::is_quit_command(&text) {
            debug!("Quit command received");
            return Some(DepartureReason::Quit);
        }

        self.metrics.message_received();
        counter!("parley.messages.received").increment(1);

        let outbound = OutboundMessage::chat(self.session.id(), self.session.identity(), &text);
        self.dispatcher.broadcast(&outbound, Some(self.session.id()));
        self.handler.on_message(&self.session, &text).await;
        None
    }

    async fn terminate(&mut self, reason: &DepartureReason) {
        if !self.session.transition(SessionState::Active, SessionState::Closing) {
            trace!("Session already terminating");
            return;
        }
        self.session.close();

        // Frames queued before a quit are still owed to the client.
        if matches!(reason, DepartureReason::Quit) {
            while let Ok(payload) = self.inbox.try_recv() {
                if self.write(payload).await.is_err() {
                    break;
                }
            }
        }
        self.inbox.close();

        if let Err(e) = timeout(self.config.write_timeout, self.connection.close()).await {
            debug!(error = %e, "Timed out closing connection");
        }

        self.metrics.session_closed(self.session.created_at().elapsed());
        gauge!("parley.sessions.active").decrement(1.0);

        if self.registry.release(&self.session) {
            let notice = OutboundMessage::system(message::left_notice(self.session.identity()));
            self.dispatcher.broadcast(&notice, None);
            self.handler.on_depart(&self.session, reason).await;
        }

        self.session.set_state(SessionState::Closed);
        info!(reason = %reason, "Session ended");
    }
}

impl std::fmt::Debug for SessionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWorker")
            .field("session", &self.session)
            .field("last_activity", &self.last_activity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ServerConfig, SessionId};
    use async_trait::async_trait;
    use metrics::{Key, KeyName, Metadata, SharedString, Unit};
    use parley_codec::DEFAULT_MAX_FRAME_LENGTH;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingHandler {
        messages: Mutex<Vec<String>>,
        departures: AtomicUsize,
    }

    #[async_trait]
    impl RelayHandler for RecordingHandler {
        async fn on_message(&self, _session: &Session, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }

        async fn on_depart(&self, _session: &Session, _reason: &DepartureReason) {
            self.departures.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Room {
        registry: Arc<SessionRegistry>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<ServerMetrics>,
        handler: Arc<RecordingHandler>,
        shutdown: CancellationToken,
        next_id: u64,
    }

    impl Room {
        fn new() -> Self {
            let registry = Arc::new(SessionRegistry::new());
            let metrics = Arc::new(ServerMetrics::new());
            Self {
                dispatcher: Arc::new(Dispatcher::new(registry.clone(), metrics.clone())),
                registry,
                metrics,
                handler: Arc::new(RecordingHandler::default()),
                shutdown: CancellationToken::new(),
                next_id: 1,
            }
        }

        fn admit(&mut self, identity: &str) -> (Arc<Session>, SessionInbox) {
            let id = SessionId::new(self.next_id);
            self.next_id += 1;
            let (session, inbox) = Session::new(id, identity, None, 16, &self.shutdown);
            self.metrics.session_opened();
            (self.registry.admit(session).unwrap(), inbox)
        }

        /// Admit `identity` with a running worker; returns the client end of its connection
        fn connect(
            &mut self,
            identity: &str,
            config: WorkerConfig,
        ) -> (Arc<Session>, RelayConnection, tokio::task::JoinHandle<DepartureReason>) {
            let (session, inbox) = self.admit(identity);
            let (server_end, client_end) = tokio::io::duplex(4096);
            let limits = ServerConfig::default();
            let worker = SessionWorker::new(
                session.clone(),
                RelayConnection::new(server_end, None, limits.max_frame_length)
                    .with_max_outbound_frame_length(limits.max_outbound_frame_length()),
                inbox,
                self.dispatcher.clone(),
                self.handler.clone(),
                self.metrics.clone(),
                config,
            );
            let handle = tokio::spawn(worker.run());
            let client = RelayConnection::new(client_end, None, 2 * DEFAULT_MAX_FRAME_LENGTH);
            (session, client, handle)
        }
    }

    /// Counts `counter!` increments by metric name
    #[derive(Default)]
    struct CountingRecorder {
        counts: Arc<Mutex<HashMap<String, u64>>>,
    }

    struct NamedCounter {
        name: String,
        counts: Arc<Mutex<HashMap<String, u64>>>,
    }

    impl metrics::CounterFn for NamedCounter {
        fn increment(&self, value: u64) {
            *self.counts.lock().unwrap().entry(self.name.clone()).or_default() += value;
        }

        fn absolute(&self, _value: u64) {}
    }

    impl metrics::Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> metrics::Counter {
            metrics::Counter::from_arc(Arc::new(NamedCounter {
                name: key.name().to_string(),
                counts: self.counts.clone(),
            }))
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> metrics::Gauge {
            metrics::Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> metrics::Histogram {
            metrics::Histogram::noop()
        }
    }

    async fn next_text(inbox: &mut SessionInbox) -> String {
        let payload = inbox.recv().await.unwrap();
        String::from_utf8_lossy(&payload).into_owned()
    }

    #[tokio::test]
    async fn test_chat_is_relayed_to_others() {
        let mut room = Room::new();
        let (_alice, mut client, _handle) = room.connect("alice", WorkerConfig::default());
        let (_bob, mut bob_inbox) = room.admit("bob");

        client.send_text("hello").await.unwrap();

        assert_eq!(next_text(&mut bob_inbox).await, "alice: hello");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*room.handler.messages.lock().unwrap(), vec!["hello"]);
        assert_eq!(room.metrics.snapshot().messages_received, 1);
    }

    #[tokio::test]
    async fn test_largest_chat_frame_reaches_others() {
        let mut room = Room::new();
        let (_alice, mut alice_client, alice_handle) = room.connect("alice", WorkerConfig::default());
        let (_bob, mut bob_client, bob_handle) = room.connect("bob", WorkerConfig::default());

        let text = "x".repeat(DEFAULT_MAX_FRAME_LENGTH);
        alice_client.send_text(&text).await.unwrap();

        let relayed = bob_client.receive().await.unwrap().unwrap();
        assert_eq!(relayed.len(), DEFAULT_MAX_FRAME_LENGTH + "alice: ".len());
        assert!(relayed.starts_with(b"alice: xxx"));
        assert_eq!(room.registry.identities(), vec!["alice", "bob"]);
        assert!(!alice_handle.is_finished());
        assert!(!bob_handle.is_finished());
    }

    #[test]
    fn test_chat_line_counted_once() {
        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let mut room = Room::new();
                let (_alice, mut client, _handle) = room.connect("alice", WorkerConfig::default());
                let (_bob, mut bob_inbox) = room.admit("bob");

                client.send_text("hello").await.unwrap();
                assert_eq!(next_text(&mut bob_inbox).await, "alice: hello");
            });
        });

        let counts = recorder.counts.lock().unwrap();
        assert_eq!(counts.get("parley.messages.received"), Some(&1));
        assert_eq!(counts.get("parley.frames.received"), Some(&1));
    }

    #[tokio::test]
    async fn test_queued_messages_reach_client() {
        let mut room = Room::new();
        let (alice, mut client, _handle) = room.connect("alice", WorkerConfig::default());

        alice.deliver(Bytes::from_static(b"Server: hi")).unwrap();
        alice.deliver(Bytes::from_static(b"bob: there")).unwrap();

        assert_eq!(client.receive().await.unwrap().unwrap(), "Server: hi");
        assert_eq!(client.receive().await.unwrap().unwrap(), "bob: there");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_quit_announces_departure_once() {
        let mut room = Room::new();
        let (alice, mut client, handle) = room.connect("alice", WorkerConfig::default());
        let (_bob, mut bob_inbox) = room.admit("bob");

        client.send_text("/quit").await.unwrap();

        assert_eq!(handle.await.unwrap(), DepartureReason::Quit);
        assert_eq!(alice.state(), SessionState::Closed);
        assert!(!room.registry.contains("alice"));
        assert_eq!(next_text(&mut bob_inbox).await, "Server: alice has left the chat.");
        assert!(bob_inbox.try_recv().is_err());
        assert_eq!(client.receive().await.unwrap(), None);
        assert_eq!(room.handler.departures.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Quit command received"));
    }

    #[tokio::test]
    async fn test_abrupt_disconnect() {
        let mut room = Room::new();
        let (_alice, client, handle) = room.connect("alice", WorkerConfig::default());
        let (_bob, mut bob_inbox) = room.admit("bob");

        drop(client);

        assert_eq!(handle.await.unwrap(), DepartureReason::Disconnected);
        assert_eq!(room.registry.identities(), vec!["bob"]);
        assert_eq!(next_text(&mut bob_inbox).await, "Server: alice has left the chat.");
        assert_eq!(room.metrics.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_empty_frames_are_ignored() {
        let mut room = Room::new();
        let (_alice, mut client, _handle) = room.connect("alice", WorkerConfig::default());
        let (_bob, mut bob_inbox) = room.admit("bob");

        client.send(Bytes::new()).await.unwrap();
        client.send_text("after").await.unwrap();

        assert_eq!(next_text(&mut bob_inbox).await, "alice: after");
    }

    #[tokio::test]
    async fn test_close_request_ends_worker() {
        let mut room = Room::new();
        let (alice, mut client, handle) = room.connect("alice", WorkerConfig::default());

        alice.close();

        assert_eq!(handle.await.unwrap(), DepartureReason::Closed);
        assert!(room.registry.is_empty());
        assert_eq!(client.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stale_worker_does_not_announce() {
        let mut room = Room::new();
        let (alice, _client, handle) = room.connect("alice", WorkerConfig::default());
        let (_bob, mut bob_inbox) = room.admit("bob");

        // Someone else already removed the entry
        room.registry.remove("alice");
        alice.close();

        assert_eq!(handle.await.unwrap(), DepartureReason::Closed);
        assert!(bob_inbox.try_recv().is_err());
        assert_eq!(room.handler.departures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let mut room = Room::new();
        let config = WorkerConfig {
            idle_timeout: Some(Duration::from_secs(30)),
            ..WorkerConfig::default()
        };
        let (_alice, _client, handle) = room.connect("alice", config);

        assert_eq!(handle.await.unwrap(), DepartureReason::IdleTimeout);
        assert!(room.registry.is_empty());
    }
}
