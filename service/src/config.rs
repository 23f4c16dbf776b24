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

//! Server configuration

use crate::message::CHAT_SEPARATOR;
use crate::{RelayError, Result, WorkerConfig};
use parley_codec::DEFAULT_MAX_FRAME_LENGTH;
use std::net::SocketAddr;
use std::time::Duration;

/// Default port the relay listens on
pub const DEFAULT_PORT: u16 = 55555;

/// Server configuration
///
/// This structure contains all configuration options for the relay server.
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use parley_service::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_max_connections(50)
///     .with_handshake_timeout(Duration::from_secs(10))
///     .with_idle_timeout(Some(Duration::from_secs(600)));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent sessions
    pub max_connections: usize,

    /// How long a new connection may take to answer the identity request
    pub handshake_timeout: Duration,

    /// Timeout for idle sessions (no traffic in either direction)
    ///
    /// `None` keeps quiet participants connected indefinitely.
    pub idle_timeout: Option<Duration>,

    /// Timeout for a single write to a client
    ///
    /// A client that cannot accept a message within this duration is disconnected.
    pub write_timeout: Duration,

    /// Timeout for graceful shutdown
    ///
    /// The server waits this long for session workers to finish before aborting them.
    pub shutdown_timeout: Duration,

    /// Number of messages that may wait in one session's outbound queue
    pub outbound_queue_size: usize,

    /// Largest frame payload accepted from a client
    ///
    /// Relayed chat carries the sender's identity in front of the text, so frames
    /// sent to clients may be longer; see [`max_outbound_frame_length`](Self::max_outbound_frame_length).
    pub max_frame_length: usize,

    /// Longest identity, in bytes, a client may choose
    pub max_identity_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            max_connections: 1000,
            handshake_timeout: Duration::from_secs(30),
            idle_timeout: None,
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            outbound_queue_size: 256,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            max_identity_length: 32,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the maximum number of concurrent sessions
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the handshake timeout duration
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the idle timeout duration
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the write timeout duration
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the per-session outbound queue size
    pub fn with_outbound_queue_size(mut self, size: usize) -> Self {
        self.outbound_queue_size = size;
        self
    }

    /// Set the maximum frame payload length
    pub fn with_max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }

    /// Set the maximum identity length
    pub fn with_max_identity_length(mut self, length: usize) -> Self {
        self.max_identity_length = length;
        self
    }

    /// Largest frame payload the server sends to a client
    ///
    /// A chat frame of `max_frame_length` bytes relayed from the longest allowed
    /// identity must still fit.
    pub fn max_outbound_frame_length(&self) -> usize {
        self.max_frame_length + self.max_identity_length + CHAT_SEPARATOR.len()
    }

    /// Derive the per-session worker configuration
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            idle_timeout: self.idle_timeout,
            write_timeout: self.write_timeout,
        }
    }

    /// Validate the configuration
    ///
    /// Returns [`RelayError::InvalidConfig`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(invalid("max_connections must be greater than 0"));
        }

        if self.handshake_timeout.is_zero() {
            return Err(invalid("handshake_timeout must be greater than 0"));
        }

        if self.idle_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(invalid("idle_timeout must be greater than 0 when set"));
        }

        if self.write_timeout.is_zero() {
            return Err(invalid("write_timeout must be greater than 0"));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(invalid("shutdown_timeout must be greater than 0"));
        }

        if self.outbound_queue_size == 0 {
            return Err(invalid("outbound_queue_size must be greater than 0"));
        }

        if self.max_identity_length == 0 {
            return Err(invalid("max_identity_length must be greater than 0"));
        }

        // Every notice embeds an identity, so the frame limit has to leave room for one.
        if self.max_frame_length < self.max_identity_length + 64 {
            return Err(invalid(
                "max_frame_length must leave room for an identity plus a notice",
            ));
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> RelayError {
    RelayError::InvalidConfig(reason.to_string())
}
