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

//! Observer hooks for relay events

use crate::{DepartureReason, RelayError, Session};
use async_trait::async_trait;

/// Relay event handler trait
///
/// Implement this trait to observe the relay. Relaying itself is not affected by the
/// handler: messages are broadcast whether or not a hook is implemented. All methods
/// are async and have default implementations that do nothing.
///
/// Hooks run on the session's own worker task, so a slow hook delays that session
/// and nobody else.
///
/// # Example
///
/// ```no_run
/// use parley_service::{RelayHandler, Session};
/// use async_trait::async_trait;
///
/// struct AuditLog;
///
/// #[async_trait]
/// impl RelayHandler for AuditLog {
///     async fn on_message(&self, session: &Session, text: &str) {
///         println!("{} said {}", session.identity(), text);
///     }
/// }
/// ```
#[async_trait]
pub trait RelayHandler: Send + Sync + 'static {
    /// Called after a session has been admitted and its welcome queued
    async fn on_admit(&self, _session: &Session) {}

    /// Called when a connection is refused during the handshake
    ///
    /// `identity` is whatever the client proposed, or empty if it never answered.
    async fn on_reject(&self, _identity: &str, _error: &RelayError) {}

    /// Called for every chat message after it has been broadcast
    async fn on_message(&self, _session: &Session, _text: &str) {}

    /// Called once after a session has been removed and its departure announced
    async fn on_depart(&self, _session: &Session, _reason: &DepartureReason) {}
}

/// Handler that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl RelayHandler for NoopHandler {}
