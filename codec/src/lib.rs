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

//! # Parley Frame Codec
//!
//! This crate provides the wire framing used between Parley chat clients and the relay
//! server. A byte stream carries a sequence of frames, each one a single logical message:
//!
//! ```text
//! +----------------------+---------------------------+
//! | length: u32 (BE)     | payload: `length` bytes   |
//! +----------------------+---------------------------+
//! ```
//!
//! Reading from a TCP socket never guarantees that one `read` returns one message. Bytes
//! of a single message may arrive split across several reads, and several messages may be
//! coalesced into one read. [`FrameCodec`] buffers partial frames and splits coalesced ones
//! so the layers above always see whole messages.
//!
//! ## Usage Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use parley_codec::FrameCodec;
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! # fn example() -> Result<(), parley_codec::CodecError> {
//! let mut codec = FrameCodec::new();
//! let mut buffer = BytesMut::new();
//!
//! codec.encode("NICK", &mut buffer)?;
//! codec.encode("alice", &mut buffer)?;
//!
//! assert_eq!(codec.decode(&mut buffer)?.as_deref(), Some(&b"NICK"[..]));
//! assert_eq!(codec.decode(&mut buffer)?.as_deref(), Some(&b"alice"[..]));
//! assert_eq!(codec.decode(&mut buffer)?, None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Limits
//!
//! Every codec carries a maximum payload length ([`DEFAULT_MAX_FRAME_LENGTH`] unless
//! configured). A peer announcing a longer frame is answered with
//! [`CodecError::FrameTooLarge`] before any payload is buffered, so a hostile length
//! prefix cannot make the server allocate unbounded memory.
//!
//! ## Thread Safety
//!
//! `FrameCodec` holds per-stream decode state and should not be shared between
//! connections. Each `Framed`, `FramedRead` or `FramedWrite` gets its own instance.

#![warn(missing_docs, future_incompatible, rust_2018_idioms)]

mod codec;
mod consts;
mod result;

pub use codec::FrameCodec;
pub use consts::{DEFAULT_MAX_FRAME_LENGTH, HEADER_LENGTH};
pub use result::{CodecError, CodecResult};
