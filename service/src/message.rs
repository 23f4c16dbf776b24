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

//! Wire-level message conventions
//!
//! Every frame is opaque to the codec; these conventions give frames meaning:
//!
//! - The server opens every connection with [`NICK_REQUEST`]; the client's first frame
//!   is its chosen identity.
//! - Server notices start with [`SYSTEM_PREFIX`].
//! - Chat messages are relayed as `"<identity>: <text>"`.
//! - A chat frame equal to [`QUIT_COMMAND`] ends the session.

use crate::SessionId;
use bytes::Bytes;
use std::borrow::Cow;

/// Identity request sent by the server immediately after accepting a connection
pub const NICK_REQUEST: &str = "NICK";

/// Prefix marking a frame as a server notice rather than a peer message
pub const SYSTEM_PREFIX: &str = "Server: ";

/// Chat text that ends the sender's session
pub const QUIT_COMMAND: &str = "/quit";

/// Separator between the sender's identity and the relayed text
pub const CHAT_SEPARATOR: &str = ": ";

/// Notice text announcing a newly admitted participant
pub fn joined_notice(identity: &str) -> String {
    format!("{} joined the chat!", identity)
}

/// Notice text announcing a departed participant
pub fn left_notice(identity: &str) -> String {
    format!("{} has left the chat.", identity)
}

/// Notice text sent only to a newly admitted participant
pub fn welcome_notice() -> String {
    format!("Welcome to the Chatroom! Type {} to leave.", QUIT_COMMAND)
}

/// Notice text sent to a connection whose identity is already taken
pub fn duplicate_identity_notice() -> &'static str {
    "ERROR! This name is already taken. Please reconnect with a different name."
}

/// Notice text sent to a connection whose identity is unusable
pub fn invalid_identity_notice(max_length: usize) -> String {
    format!(
        "ERROR! Invalid name. Names must be 1 to {} bytes of UTF-8 text.",
        max_length
    )
}

/// Notice text sent to a connection arriving while the room is at capacity
pub fn room_full_notice() -> &'static str {
    "ERROR! The chatroom is full. Please try again later."
}

/// Returns true when the chat text is the quit command
pub fn is_quit_command(text: &str) -> bool {
    text.trim_end() == QUIT_COMMAND
}

/// How the presentation layer should render a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Text typed by a participant
    Chat,
    /// Notice originated by the server
    System,
}

/// A message on its way to one or more sessions
///
/// The payload is fully formatted for the wire; the dispatcher never inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    kind: MessageKind,
    origin: Option<SessionId>,
    payload: Bytes,
}

impl OutboundMessage {
    /// Create a server notice, prefixed with [`SYSTEM_PREFIX`]
    pub fn system(text: impl AsRef<str>) -> Self {
        Self {
            kind: MessageKind::System,
            origin: None,
            payload: Bytes::from(format!("{}{}", SYSTEM_PREFIX, text.as_ref())),
        }
    }

    /// Create a chat message attributed to `identity`
    pub fn chat(origin: SessionId, identity: &str, text: &str) -> Self {
        Self {
            kind: MessageKind::Chat,
            origin: Some(origin),
            payload: Bytes::from(format!("{}{}{}", identity, CHAT_SEPARATOR, text)),
        }
    }

    /// Get the message kind
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Get the session the message came from, if any
    pub fn origin(&self) -> Option<SessionId> {
        self.origin
    }

    /// Get the wire payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Get the payload as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
