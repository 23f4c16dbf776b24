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

//! Core types for the relay service

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Unique identifier for a session (monotonically increasing, never reused)
///
/// Identities may be reused once their holder leaves; session IDs are not, which is
/// what lets a late cleanup tell its own registry entry from a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Session lifecycle state (stored as atomic u8 for lock-free state management)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Handshake in progress, not yet visible to broadcasts
    Connecting = 0,
    /// Registered and eligible to send and receive
    Active = 1,
    /// Teardown in progress
    Closing = 2,
    /// Connection released and removed from the registry
    Closed = 3,
}

impl SessionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the session is in a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Check if the session is active
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Active => write!(f, "active"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Why a session worker stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartureReason {
    /// The client sent the quit command
    Quit,
    /// The client closed its end of the connection
    Disconnected,
    /// Reading from the connection failed (reset, decode error)
    ReadFailed(String),
    /// Writing a queued message to the connection failed or timed out
    WriteFailed(String),
    /// No traffic within the configured idle timeout
    IdleTimeout,
    /// The session was closed from outside its worker
    Closed,
}

impl DepartureReason {
    /// Check if the departure was requested by the client
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::Quit | Self::Disconnected)
    }
}

impl fmt::Display for DepartureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => write!(f, "quit"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::ReadFailed(reason) => write!(f, "read failed: {}", reason),
            Self::WriteFailed(reason) => write!(f, "write failed: {}", reason),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of active sessions
    pub active_sessions: usize,
    /// Total sessions admitted since server start
    pub total_sessions: u64,
    /// Identities of the active sessions, in admission order
    pub identities: Vec<String>,
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Server uptime
    pub uptime: Duration,
    /// Server start time
    pub started_at: Instant,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RelayServer {{ active: {}, total: {}, addr: {}, uptime: {:?} }}",
            self.active_sessions, self.total_sessions, self.bind_address, self.uptime
        )
    }
}
