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

//! Connection acceptor
//!
//! The Acceptor owns the listening loop and the identity handshake. Each accepted
//! connection gets its own task that runs the handshake and, if the client is
//! admitted, continues as that session's worker. A slow or silent client therefore
//! never holds up `accept()`.
//!
//! Handshake sequence:
//! 1. Refuse with a room-full notice when the registry is at capacity
//! 2. Send `NICK`
//! 3. Read the proposed identity within `handshake_timeout`
//! 4. Validate it, then admit it to the registry
//! 5. Announce the arrival to everyone and welcome the new participant

use crate::message::{self, NICK_REQUEST, OutboundMessage};
use crate::{
    Dispatcher, RelayConnection, RelayError, RelayHandler, Result, ServerConfig, ServerMetrics,
    Session, SessionId, SessionRegistry, SessionWorker,
};
use bytes::Bytes;
use dashmap::DashMap;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Tasks spawned per connection, keyed by the id reserved at accept time
pub type WorkerTasks = Arc<DashMap<SessionId, JoinHandle<()>>>;

/// Accepts connections and runs the identity handshake
pub struct Acceptor {
    dispatcher: Arc<Dispatcher>,
    registry: Arc<SessionRegistry>,
    handler: Arc<dyn RelayHandler>,
    metrics: Arc<ServerMetrics>,
    config: ServerConfig,
    shutdown: CancellationToken,
    next_id: AtomicU64,
    workers: WorkerTasks,
}

impl Acceptor {
    /// Create an acceptor that admits sessions through `dispatcher`'s registry
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        handler: Arc<dyn RelayHandler>,
        metrics: Arc<ServerMetrics>,
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry: dispatcher.registry().clone(),
            dispatcher,
            handler,
            metrics,
            config,
            shutdown,
            next_id: AtomicU64::new(1),
            workers: Arc::new(DashMap::new()),
        }
    }

    /// Get the per-connection tasks that are still tracked
    pub fn workers(&self) -> &WorkerTasks {
        &self.workers
    }

    /// Reserve the id for the next connection
    pub fn next_session_id(&self) -> SessionId {
        SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Accept connections until the shutdown token is cancelled
    ///
    /// The listener is dropped when this returns, so no new connection can complete
    /// after shutdown begins.
    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                result = listener.accept() => result,
                _ = self.shutdown.cancelled() => break,
            };

            match accepted {
                Ok((socket, peer_addr)) => {
                    debug!(peer_addr = %peer_addr, "Accepted connection");
                    let wrapped = RelayConnection::wrap(socket, self.config.max_frame_length).map(
                        |connection| {
                            connection.with_max_outbound_frame_length(
                                self.config.max_outbound_frame_length(),
                            )
                        },
                    );
                    match wrapped {
                        Ok(connection) => self.spawn(connection),
                        Err(e) => {
                            error!(peer_addr = %peer_addr, error = %e, "Failed to wrap connection");
                            self.metrics.connection_error();
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    self.metrics.connection_error();

                    // Back off on errors to avoid tight loop
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        info!("Accept loop terminated");
    }

    /// Run the handshake and then the session worker on a new task
    pub fn spawn(self: &Arc<Self>, connection: RelayConnection) {
        let id = self.next_session_id();
        let acceptor = self.clone();
        let handle = tokio::spawn(async move {
            if let Ok(worker) = acceptor.handshake(id, connection).await {
                worker.run().await;
            }
            acceptor.workers.remove(&id);
        });
        self.workers.insert(id, handle);
        // The task may have finished before it was tracked.
        self.workers.remove_if(&id, |_, handle| handle.is_finished());
    }

    /// Run the identity handshake on a fresh connection
    ///
    /// On success the session is registered, announced and welcomed, and the returned
    /// worker is ready to run. On failure the client has been sent the matching
    /// notice and the connection is closed; nothing was registered.
    ///
    /// Shutdown abandons a handshake only before admission. Once the session is in
    /// the registry the worker is always returned, and its close signal (already
    /// cancelled in that case) drives the normal teardown.
    #[instrument(skip(self, connection), fields(session_id = %id, peer_addr = ?connection.peer_addr()))]
    pub async fn handshake(&self, id: SessionId, mut connection: RelayConnection) -> Result<SessionWorker> {
        let identity = tokio::select! {
            result = self.negotiate(&mut connection) => result?,
            _ = self.shutdown.cancelled() => {
                debug!("Handshake abandoned for shutdown");
                return Err(RelayError::ServerNotRunning);
            }
        };
        self.admit(id, identity, connection).await
    }

    /// Ask for an identity and check it
    async fn negotiate(&self, connection: &mut RelayConnection) -> Result<String> {
        if self.registry.is_full() {
            let err = RelayError::MaxConnectionsReached(self.config.max_connections);
            self.refuse(connection, "", message::room_full_notice(), &err).await;
            return Err(err);
        }

        connection.send_text(NICK_REQUEST).await?;

        let payload = match timeout(self.config.handshake_timeout, connection.receive()).await {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => {
                debug!("Connection closed during handshake");
                return Err(RelayError::ConnectionClosed);
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Handshake read failed");
                return Err(e);
            }
            Err(_) => {
                let err = RelayError::HandshakeTimeout;
                self.metrics.handshake_timeout();
                counter!("parley.sessions.rejected").increment(1);
                warn!("Client did not send an identity in time");
                self.close_quietly(connection).await;
                self.handler.on_reject("", &err).await;
                return Err(err);
            }
        };

        match validate_identity(&payload, self.config.max_identity_length) {
            Ok(identity) => Ok(identity),
            Err(err) => {
                let lossy = String::from_utf8_lossy(&payload).into_owned();
                let notice = message::invalid_identity_notice(self.config.max_identity_length);
                self.refuse(connection, &lossy, &notice, &err).await;
                Err(err)
            }
        }
    }

    /// Register a validated identity, announce it and build its worker
    async fn admit(
        &self,
        id: SessionId,
        identity: String,
        mut connection: RelayConnection,
    ) -> Result<SessionWorker> {
        let (session, inbox) = Session::new(
            id,
            identity.clone(),
            connection.peer_addr(),
            self.config.outbound_queue_size,
            &self.shutdown,
        );
        let session = match self.registry.admit(session) {
            Ok(session) => session,
            Err(err) => {
                let notice = match err {
                    RelayError::MaxConnectionsReached(_) => message::room_full_notice(),
                    _ => message::duplicate_identity_notice(),
                };
                self.refuse(&mut connection, &identity, notice, &err).await;
                return Err(err);
            }
        };

        self.metrics.session_opened();
        counter!("parley.sessions.total").increment(1);
        gauge!("parley.sessions.active").increment(1.0);
        info!(identity = session.identity(), "Session admitted");

        let joined = OutboundMessage::system(message::joined_notice(session.identity()));
        self.dispatcher.broadcast(&joined, None);
        // A failed welcome has already closed the session; its worker will clean up.
        let _ = self
            .dispatcher
            .send_to(&session, &OutboundMessage::system(message::welcome_notice()));

        self.handler.on_admit(&session).await;

        Ok(SessionWorker::new(
            session,
            connection,
            inbox,
            self.dispatcher.clone(),
            self.handler.clone(),
            self.metrics.clone(),
            self.config.worker_config(),
        ))
    }

    async fn refuse(
        &self,
        connection: &mut RelayConnection,
        identity: &str,
        notice: &str,
        error: &RelayError,
    ) {
        self.metrics.session_rejected();
        counter!("parley.sessions.rejected").increment(1);
        warn!(identity, error = %error, "Connection refused");

        let notice = OutboundMessage::system(notice);
        match timeout(self.config.write_timeout, connection.send(notice.payload().clone())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Failed to send refusal notice"),
            Err(_) => debug!("Timed out sending refusal notice"),
        }
        self.close_quietly(connection).await;
        self.handler.on_reject(identity, error).await;
    }

    async fn close_quietly(&self, connection: &mut RelayConnection) {
        if let Ok(Err(e)) = timeout(self.config.write_timeout, connection.close()).await {
            debug!(error = %e, "Error closing refused connection");
        }
    }
}

impl std::fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceptor")
            .field("session_count", &self.registry.len())
            .field("tracked_tasks", &self.workers.len())
            .finish()
    }
}

/// Check a proposed identity and return it in canonical form
///
/// Surrounding whitespace is trimmed. The result must be non-empty, at most
/// `max_length` bytes, and free of control characters.
pub fn validate_identity(payload: &Bytes, max_length: usize) -> Result<String> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| RelayError::InvalidIdentity("not valid UTF-8".to_string()))?;
    let identity = text.trim();

    if identity.is_empty() {
        return Err(RelayError::InvalidIdentity("empty".to_string()));
    }
    if identity.len() > max_length {
        return Err(RelayError::InvalidIdentity(format!(
            "{} bytes exceeds the limit of {}",
            identity.len(),
            max_length
        )));
    }
    if identity.chars().any(char::is_control) {
        return Err(RelayError::InvalidIdentity(
            "contains control characters".to_string(),
        ));
    }

    Ok(identity.to_string())
}
