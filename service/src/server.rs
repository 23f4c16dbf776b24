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

//! Relay server implementation
//!
//! The RelayServer is the main entry point of the service. It binds the listener,
//! wires the registry, dispatcher and acceptor together, and coordinates shutdown.

use crate::message::OutboundMessage;
use crate::{
    Acceptor, BroadcastResult, Dispatcher, RelayError, RelayHandler, Result, ServerConfig,
    ServerMetrics, ServerSnapshot, SessionRegistry,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Chat relay server
///
/// This is the main server that accepts connections and relays messages between
/// the admitted sessions.
///
/// # Example
///
/// ```no_run
/// use parley_service::{NoopHandler, RelayServer, ServerConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = RelayServer::new(ServerConfig::default()).await?;
///
///     server.start(Arc::new(NoopHandler))?;
///
///     // Server is now running, wait for shutdown signal
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///
///     Ok(())
/// }
/// ```
pub struct RelayServer {
    /// Server configuration
    config: ServerConfig,
    /// Active sessions
    registry: Arc<SessionRegistry>,
    /// Broadcast fan-out
    dispatcher: Arc<Dispatcher>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Listener, handed to the accept loop on start
    listener: Mutex<Option<TcpListener>>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server start time
    started_at: Instant,
    /// Running flag
    running: AtomicBool,
    /// Cancelled on shutdown; every session's close signal derives from it
    shutdown: CancellationToken,
    /// Acceptor, present once started
    acceptor: Mutex<Option<Arc<Acceptor>>>,
    /// Accept loop task handle
    accept_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    ///
    /// This validates the configuration and binds the listener but does not start
    /// accepting connections. Call `start()` to begin accepting connections.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_address).await?;
        let actual_addr = listener.local_addr()?;

        let metrics = Arc::new(ServerMetrics::new());
        let registry = Arc::new(SessionRegistry::with_limit(config.max_connections));
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), metrics.clone()));

        tracing::info!(bind_address = %actual_addr, "Relay server bound");

        Ok(Self {
            config,
            registry,
            dispatcher,
            metrics,
            listener: Mutex::new(Some(listener)),
            bind_address: actual_addr,
            started_at: Instant::now(),
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            acceptor: Mutex::new(None),
            accept_handle: Mutex::new(None),
        })
    }

    /// Start the server with the given handler
    ///
    /// This spawns the accept loop. The server keeps running until `shutdown()` is
    /// called. A server can be started once.
    pub fn start(&self, handler: Arc<dyn RelayHandler>) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RelayError::ServerAlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(bind_address = %self.bind_address, "Starting relay server");

        let acceptor = Arc::new(Acceptor::new(
            self.dispatcher.clone(),
            handler,
            self.metrics.clone(),
            self.config.clone(),
            self.shutdown.clone(),
        ));
        let handle = tokio::spawn(acceptor.clone().run(listener));

        *self.acceptor.lock().unwrap_or_else(PoisonError::into_inner) = Some(acceptor);
        *self.accept_handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(())
    }

    /// Shutdown the server gracefully
    ///
    /// This stops accepting new connections, closes every session and waits for the
    /// per-connection tasks to finish (up to the configured shutdown timeout). Tasks
    /// still running after the timeout are aborted.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(RelayError::ServerNotRunning);
        }

        tracing::info!("Shutting down relay server");
        self.shutdown.cancel();

        let accept_handle = self
            .accept_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = accept_handle {
            let _ = tokio::time::timeout(self.config.shutdown_timeout, handle).await;
        }

        let acceptor = self
            .acceptor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(acceptor) = acceptor {
            let ids: Vec<_> = acceptor.workers().iter().map(|entry| *entry.key()).collect();
            let handles: Vec<_> = ids
                .into_iter()
                .filter_map(|id| acceptor.workers().remove(&id).map(|(_, handle)| handle))
                .collect();

            let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;
            for mut handle in handles {
                if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                    tracing::warn!("Session task did not finish in time, aborting");
                    handle.abort();
                }
            }
        }

        tracing::info!("Relay server shutdown complete");

        Ok(())
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of active sessions
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Broadcast a server notice to every active session
    pub fn broadcast_system(&self, text: &str) -> BroadcastResult {
        self.dispatcher.broadcast(&OutboundMessage::system(text), None)
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_sessions: self.registry.len(),
            total_sessions: self.metrics.total_sessions(),
            identities: self.registry.identities(),
            bind_address: self.bind_address(),
            uptime: self.started_at.elapsed(),
            started_at: self.started_at,
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Get the broadcast dispatcher
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("bind_address", &self.bind_address())
            .field("running", &self.is_running())
            .field("session_count", &self.session_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

// Implement Drop to ensure cleanup
impl Drop for RelayServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("RelayServer dropped while still running");
            self.running.store(false, Ordering::SeqCst);
            self.shutdown.cancel();
        }
    }
}
