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

//! Error types for the relay service

use crate::types::SessionId;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay service error types
#[derive(Debug, Error)]
pub enum RelayError {
    /// I/O error from the underlying stream or listener
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error from the codec layer
    #[error("Codec error: {0}")]
    Codec(#[from] parley_codec::CodecError),

    /// Another active session already holds this identity
    #[error("Identity '{0}' is already taken")]
    DuplicateIdentity(String),

    /// The proposed identity is empty, too long, or not valid UTF-8
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// The client did not answer the identity request in time
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// A message could not be queued for a recipient
    #[error("Delivery to {session} failed: {reason}")]
    DeliveryFailed {
        /// The recipient session
        session: SessionId,
        /// Why the delivery failed
        reason: String,
    },

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was already started
    #[error("Server already running")]
    ServerAlreadyRunning,

    /// Maximum number of sessions reached
    #[error("Maximum connections ({0}) reached")]
    MaxConnectionsReached(usize),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Check if the error is recoverable
    ///
    /// Recoverable errors are local to one connection or one delivery; the server
    /// keeps running and other sessions are unaffected.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RelayError::Timeout
                | RelayError::ConnectionClosed
                | RelayError::DeliveryFailed { .. }
                | RelayError::DuplicateIdentity(_)
                | RelayError::InvalidIdentity(_)
                | RelayError::HandshakeTimeout
                | RelayError::MaxConnectionsReached(_)
                | RelayError::Codec(_)
        )
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RelayError::ConnectionClosed | RelayError::Io(_) | RelayError::Codec(_)
        )
    }

    /// Check if the error rejected a connection during the identity handshake
    pub fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            RelayError::DuplicateIdentity(_)
                | RelayError::InvalidIdentity(_)
                | RelayError::HandshakeTimeout
                | RelayError::MaxConnectionsReached(_)
        )
    }
}
