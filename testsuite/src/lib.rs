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

//! Shared fixtures for end-to-end tests of the chat relay
//!
//! Starts real servers on ephemeral loopback ports and records what the relay
//! reports through its handler hooks.

use async_trait::async_trait;
use parley_client::ClientConfig;
use parley_service::{DepartureReason, RelayError, RelayHandler, RelayServer, ServerConfig, Session};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Handler that records every relay event
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Events>,
    changed: Notify,
}

/// Everything a [`RecordingHandler`] has seen so far
#[derive(Debug, Default, Clone)]
pub struct Events {
    /// Identities in the order they were admitted
    pub admitted: Vec<String>,
    /// Proposed identities that were refused, with the error text
    pub rejected: Vec<(String, String)>,
    /// Chat messages as (sender, text)
    pub messages: Vec<(String, String)>,
    /// Departures as (identity, reason)
    pub departures: Vec<(String, DepartureReason)>,
}

impl RecordingHandler {
    /// Create an empty recorder
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Events> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, update: impl FnOnce(&mut Events)) {
        update(&mut self.lock());
        self.changed.notify_waiters();
    }

    /// Copy of the events recorded so far
    pub fn events(&self) -> Events {
        self.lock().clone()
    }

    /// Wait until `condition` holds, giving up after `limit`
    pub async fn wait_for(&self, limit: Duration, condition: impl Fn(&Events) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let changed = self.changed.notified();
            if condition(&self.lock()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return condition(&self.lock());
            }
        }
    }
}

#[async_trait]
impl RelayHandler for RecordingHandler {
    async fn on_admit(&self, session: &Session) {
        let identity = session.identity().to_string();
        self.record(|events| events.admitted.push(identity));
    }

    async fn on_reject(&self, identity: &str, error: &RelayError) {
        let entry = (identity.to_string(), error.to_string());
        self.record(|events| events.rejected.push(entry));
    }

    async fn on_message(&self, session: &Session, text: &str) {
        let entry = (session.identity().to_string(), text.to_string());
        self.record(|events| events.messages.push(entry));
    }

    async fn on_depart(&self, session: &Session, reason: &DepartureReason) {
        let entry = (session.identity().to_string(), reason.clone());
        self.record(|events| events.departures.push(entry));
    }
}

/// Server configuration bound to an ephemeral loopback port
pub fn local_config() -> ServerConfig {
    ServerConfig::new(([127, 0, 0, 1], 0).into())
}

/// Bind and start a server with `handler`
pub async fn start_server(
    config: ServerConfig,
    handler: Arc<dyn RelayHandler>,
) -> parley_service::Result<RelayServer> {
    let server = RelayServer::new(config).await?;
    server.start(handler)?;
    Ok(server)
}

/// Client configuration pointing at `server`
pub fn client_config(server: &RelayServer, nickname: &str) -> ClientConfig {
    let address = server.bind_address();
    ClientConfig::new(address.ip().to_string(), address.port())
        .with_nickname(nickname)
        .with_connect_timeout(Duration::from_secs(5))
        .with_read_timeout(Some(Duration::from_secs(5)))
}
