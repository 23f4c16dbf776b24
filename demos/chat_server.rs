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

//! Chat Relay Server Demo
//!
//! Runs a chat relay that logs arrivals, departures and messages.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p parley-service --example chat_server -- 127.0.0.1:55555
//! ```
//!
//! Then connect with the `chat_client` demo from another terminal.

use async_trait::async_trait;
use parley_service::{
    DepartureReason, RelayError, RelayHandler, RelayServer, ServerConfig, Session,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Handler that logs every relay event
struct LoggingHandler;

#[async_trait]
impl RelayHandler for LoggingHandler {
    async fn on_admit(&self, session: &Session) {
        info!(identity = session.identity(), peer = ?session.peer_addr(), "Joined");
    }

    async fn on_reject(&self, identity: &str, error: &RelayError) {
        warn!(identity, error = %error, "Refused");
    }

    async fn on_message(&self, session: &Session, text: &str) {
        info!(identity = session.identity(), text, "Message");
    }

    async fn on_depart(&self, session: &Session, reason: &DepartureReason) {
        info!(identity = session.identity(), reason = %reason, "Left");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let bind_address: SocketAddr = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("127.0.0.1:55555")
        .parse()?;

    let server = RelayServer::new(ServerConfig::new(bind_address)).await?;
    server.start(Arc::new(LoggingHandler))?;

    println!("Chat server listening on {}", server.bind_address());
    println!("Press Ctrl+C to stop");

    // Wait for Ctrl+C
    tokio::signal::ctrl_c().await?;

    server.shutdown().await?;
    let metrics = server.metrics().snapshot();
    println!(
        "Served {} sessions and relayed {} messages ({:.2}/s)",
        metrics.total_sessions,
        metrics.messages_received,
        metrics.messages_received_per_sec()
    );

    Ok(())
}
