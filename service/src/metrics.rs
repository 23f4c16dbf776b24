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

//! Lock-free metrics for the relay server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All metrics are stored as atomics and can be accessed concurrently
/// without locks. Use the `snapshot()` method to get a view of all metrics
/// at a point in time.
#[derive(Debug)]
pub struct ServerMetrics {
    // Session counts
    total_sessions: AtomicU64,
    active_sessions: AtomicU64,
    rejected_sessions: AtomicU64,

    // Traffic
    messages_received: AtomicU64,
    broadcasts: AtomicU64,

    // Errors
    connection_errors: AtomicU64,
    delivery_failures: AtomicU64,
    handshake_timeouts: AtomicU64,

    // Timing (stored as nanoseconds)
    total_session_duration_ns: AtomicU64,
    closed_sessions: AtomicU64,

    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_sessions: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            rejected_sessions: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            handshake_timeouts: AtomicU64::new(0),
            total_session_duration_ns: AtomicU64::new(0),
            closed_sessions: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Session tracking

    /// Record a session being admitted
    pub fn session_opened(&self) {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session being closed
    pub fn session_closed(&self, duration: Duration) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
        self.closed_sessions.fetch_add(1, Ordering::Relaxed);
        self.total_session_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Record a handshake that was refused
    pub fn session_rejected(&self) {
        self.rejected_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current number of active sessions
    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Get the total number of sessions admitted since server start
    pub fn total_sessions(&self) -> u64 {
        self.total_sessions.load(Ordering::Relaxed)
    }

    // Traffic tracking

    /// Record a chat message received from a client
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a broadcast fan-out
    pub fn broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking

    /// Record a connection error
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed delivery to one recipient
    pub fn delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handshake that timed out
    pub fn handshake_timeout(&self) {
        self.handshake_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // Snapshot

    /// Get a snapshot of all metrics
    ///
    /// Individual counters are read independently, so the snapshot may straddle
    /// concurrent updates. That is fine for monitoring.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            rejected_sessions: self.rejected_sessions.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            handshake_timeouts: self.handshake_timeouts.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            avg_session_duration: self.average_session_duration(),
        }
    }

    fn average_session_duration(&self) -> Duration {
        let closed = self.closed_sessions.load(Ordering::Relaxed);
        if closed == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_session_duration_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / closed)
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total sessions admitted since server start
    pub total_sessions: u64,
    /// Current active sessions
    pub active_sessions: u64,
    /// Handshakes refused (duplicate or invalid name, room full)
    pub rejected_sessions: u64,
    /// Chat messages received from clients
    pub messages_received: u64,
    /// Broadcast fan-outs performed
    pub broadcasts: u64,
    /// Connection errors
    pub connection_errors: u64,
    /// Failed deliveries to individual recipients
    pub delivery_failures: u64,
    /// Handshakes that timed out
    pub handshake_timeouts: u64,
    /// Server uptime
    pub uptime: Duration,
    /// Average duration of closed sessions
    pub avg_session_duration: Duration,
}

impl MetricsSnapshot {
    /// Calculate chat messages received per second
    pub fn messages_received_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.messages_received as f64 / self.uptime.as_secs_f64()
    }

    /// Calculate total error count
    pub fn total_errors(&self) -> u64 {
        self.connection_errors + self.delivery_failures + self.handshake_timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_session_tracking() {
        let metrics = ServerMetrics::new();

        assert_eq!(metrics.active_sessions(), 0);
        assert_eq!(metrics.total_sessions(), 0);

        metrics.session_opened();
        metrics.session_opened();
        assert_eq!(metrics.active_sessions(), 2);
        assert_eq!(metrics.total_sessions(), 2);

        metrics.session_closed(Duration::from_secs(10));
        assert_eq!(metrics.active_sessions(), 1);
        assert_eq!(metrics.total_sessions(), 2);
        assert_eq!(metrics.snapshot().avg_session_duration, Duration::from_secs(10));
    }

    #[test]
    fn test_error_tracking() {
        let metrics = ServerMetrics::new();

        metrics.connection_error();
        metrics.delivery_failure();
        metrics.handshake_timeout();
        metrics.session_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connection_errors, 1);
        assert_eq!(snapshot.delivery_failures, 1);
        assert_eq!(snapshot.handshake_timeouts, 1);
        assert_eq!(snapshot.rejected_sessions, 1);
        assert_eq!(snapshot.total_errors(), 3);
    }

    #[test]
    fn test_message_rate() {
        let mut snapshot = ServerMetrics::new().snapshot();
        snapshot.uptime = Duration::ZERO;
        snapshot.messages_received = 50;
        assert_eq!(snapshot.messages_received_per_sec(), 0.0);

        snapshot.uptime = Duration::from_secs(10);
        assert_eq!(snapshot.messages_received_per_sec(), 5.0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = std::sync::Arc::new(ServerMetrics::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.session_opened();
                        metrics.message_received();
                        metrics.broadcast();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_sessions, 1000);
        assert_eq!(snapshot.messages_received, 1000);
        assert_eq!(snapshot.broadcasts, 1000);
    }
}
