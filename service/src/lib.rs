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

//! Parley chat relay service
//!
//! This crate provides an async multi-client chat relay: every client connects over
//! TCP, picks a unique name, and every line it sends is relayed to every other
//! connected client.
//!
//! - Identities are unique: concurrent handshakes for one name admit exactly one
//! - Every recipient sees broadcasts in the same global order
//! - Each session has its own outbound queue, so a slow client never stalls the room
//! - Teardown is idempotent and the departure notice is sent exactly once
//! - Lock-free metrics and monitoring
//!
//! # Architecture
//!
//! ```text
//! RelayServer
//!     ↓
//! Acceptor ──admit──→ SessionRegistry ←──snapshot── Dispatcher
//!     ↓                                                ↑
//! SessionWorker → RelayConnection                      │
//!     └────────────────── broadcast ───────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use parley_service::{RelayHandler, RelayServer, ServerConfig, Session};
//! use async_trait::async_trait;
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl RelayHandler for MyHandler {
//!     async fn on_admit(&self, session: &Session) {
//!         println!("{} joined", session.identity());
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = RelayServer::new(config).await?;
//!     server.start(std::sync::Arc::new(MyHandler))?;
//!     Ok(())
//! }
//! ```

mod acceptor;
mod config;
mod connection;
mod dispatcher;
mod error;
mod handler;
pub mod message;
mod metrics;
mod registry;
mod server;
mod session;
mod types;
mod worker;

pub use acceptor::{Acceptor, WorkerTasks, validate_identity};
pub use config::{DEFAULT_PORT, ServerConfig};
pub use connection::RelayConnection;
pub use dispatcher::{BroadcastResult, Dispatcher};
pub use error::{RelayError, Result};
pub use handler::{NoopHandler, RelayHandler};
pub use message::{MessageKind, OutboundMessage};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use registry::SessionRegistry;
pub use server::RelayServer;
pub use session::{Session, SessionInbox};
pub use types::{DepartureReason, ServerSnapshot, SessionId, SessionState};
pub use worker::{SessionWorker, WorkerConfig};
