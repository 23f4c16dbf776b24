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

//! Client configuration

use parley_codec::DEFAULT_MAX_FRAME_LENGTH;
use std::time::Duration;

/// Default limit for frames received from the server
///
/// Relayed chat carries the sender's name in front of text that may already be
/// [`DEFAULT_MAX_FRAME_LENGTH`] bytes long, so incoming frames get headroom.
pub const DEFAULT_MAX_INCOMING_FRAME_LENGTH: usize = DEFAULT_MAX_FRAME_LENGTH + 256;

/// Chat client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname or IP address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Name to register with the server
    pub nickname: String,

    /// Connection timeout, also bounding the identity handshake
    pub connect_timeout: Duration,

    /// Read timeout (None for no timeout)
    pub read_timeout: Option<Duration>,

    /// Largest frame payload sent to the server
    pub max_frame_length: usize,

    /// Largest frame payload accepted from the server
    pub max_incoming_frame_length: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 55555,
            nickname: String::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: None,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            max_incoming_frame_length: DEFAULT_MAX_INCOMING_FRAME_LENGTH,
        }
    }
}

impl ClientConfig {
    /// Create a new client configuration with the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the nickname
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the maximum frame length
    pub fn with_max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }

    /// Set the maximum length of frames accepted from the server
    pub fn with_max_incoming_frame_length(mut self, length: usize) -> Self {
        self.max_incoming_frame_length = length;
        self
    }

    /// Get the server address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.address(), "127.0.0.1:55555");
        assert!(config.nickname.is_empty());
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
        assert!(config.max_incoming_frame_length > config.max_frame_length);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("chat.example.com", 4000)
            .with_nickname("alice")
            .with_connect_timeout(Duration::from_secs(2))
            .with_read_timeout(Some(Duration::from_secs(30)))
            .with_max_frame_length(1024)
            .with_max_incoming_frame_length(2048);

        assert_eq!(config.address(), "chat.example.com:4000");
        assert_eq!(config.nickname, "alice");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_frame_length, 1024);
        assert_eq!(config.max_incoming_frame_length, 2048);
    }
}
