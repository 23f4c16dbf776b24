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

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Represents possible errors that can occur while framing or unframing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An I/O error occurred while reading from or writing to the underlying stream.
    ///
    /// Contains the error kind and a description of what operation failed.
    IOError {
        /// The kind of I/O error that occurred
        kind: std::io::ErrorKind,
        /// Description of the operation that failed
        operation: String,
    },

    /// A frame exceeded the codec's configured maximum payload length.
    ///
    /// Raised while decoding when the peer announces an oversized frame, and while
    /// encoding when the caller hands the codec an oversized payload.
    FrameTooLarge {
        /// Payload length that was announced or requested
        length: usize,
        /// Largest payload length the codec accepts
        max: usize,
    },
}

impl CodecError {
    /// Check if the error was caused by an oversized frame
    pub fn is_frame_too_large(&self) -> bool {
        matches!(self, CodecError::FrameTooLarge { .. })
    }
}

impl std::error::Error for CodecError {}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::IOError { kind, operation } => {
                write!(f, "I/O error during {}: {:?}", operation, kind)
            }
            CodecError::FrameTooLarge { length, max } => {
                write!(f, "frame of {} bytes exceeds the {} byte limit", length, max)
            }
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::IOError {
            kind: err.kind(),
            operation: err.to_string(),
        }
    }
}
