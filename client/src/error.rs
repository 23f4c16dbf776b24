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

//! Client error types

use parley_codec::CodecError;
use std::fmt;
use std::io;

/// Client error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// I/O error
    Io(String),

    /// Connection timeout
    ConnectionTimeout,

    /// Read timeout
    ReadTimeout,

    /// Connection closed by server
    ConnectionClosed,

    /// Connection refused
    ConnectionRefused,

    /// Framing error
    CodecError(String),

    /// The server did not open with the identity request
    UnexpectedGreeting(String),

    /// The server refused the nickname; carries the server's notice
    NameRejected(String),
}

impl ClientError {
    /// Check if the error means the connection is gone
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Io(_))
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::ConnectionTimeout => write!(f, "Connection timeout"),
            Self::ReadTimeout => write!(f, "Read timeout"),
            Self::ConnectionClosed => write!(f, "Connection closed by server"),
            Self::ConnectionRefused => write!(f, "Connection refused"),
            Self::CodecError(msg) => write!(f, "Codec error: {}", msg),
            Self::UnexpectedGreeting(frame) => write!(f, "Unexpected greeting: {}", frame),
            Self::NameRejected(notice) => write!(f, "Name rejected: {}", notice),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        Self::from_kind(error.kind()).unwrap_or_else(|| Self::Io(error.to_string()))
    }
}

impl From<CodecError> for ClientError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::IOError { kind, operation } => {
                Self::from_kind(kind).unwrap_or(Self::Io(operation))
            }
            other => Self::CodecError(other.to_string()),
        }
    }
}

impl ClientError {
    fn from_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::TimedOut => Some(Self::ReadTimeout),
            io::ErrorKind::ConnectionRefused => Some(Self::ConnectionRefused),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Some(Self::ConnectionClosed),
            _ => None,
        }
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(ClientError::from(reset), ClientError::ConnectionClosed);

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(ClientError::from(refused), ClientError::ConnectionRefused);

        let other = io::Error::other("boom");
        assert!(matches!(ClientError::from(other), ClientError::Io(_)));
    }

    #[test]
    fn test_codec_error_mapping() {
        let too_large = CodecError::FrameTooLarge { length: 10, max: 5 };
        assert!(matches!(ClientError::from(too_large), ClientError::CodecError(_)));

        let truncated = CodecError::IOError {
            kind: io::ErrorKind::UnexpectedEof,
            operation: "decode".to_string(),
        };
        assert_eq!(ClientError::from(truncated), ClientError::ConnectionClosed);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ClientError::NameRejected("taken".into()).to_string(),
            "Name rejected: taken"
        );
        assert!(ClientError::ConnectionClosed.is_disconnect());
        assert!(!ClientError::ReadTimeout.is_disconnect());
    }
}
