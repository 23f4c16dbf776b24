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

use crate::consts::{DEFAULT_MAX_FRAME_LENGTH, HEADER_LENGTH};
use crate::result::CodecError;
use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

/// Length-prefixed frame codec
///
/// Implements [`Decoder`] yielding one [`Bytes`] payload per frame, and [`Encoder`] for
/// the common payload types (`Bytes`, `&[u8]`, `&str`, `String`). Encoding never appends
/// line terminators; the length prefix alone delimits a message.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_length: usize,
    decoder_state: DecoderState,
}

/// Decoder progress through the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for a complete length prefix
    Header,
    /// Length prefix consumed, waiting for this many payload bytes
    Payload(usize),
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Creates a codec accepting payloads up to [`DEFAULT_MAX_FRAME_LENGTH`] bytes
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    /// Creates a codec accepting payloads up to `max_frame_length` bytes
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            decoder_state: DecoderState::Header,
        }
    }

    /// Largest payload this codec will encode or decode
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    /// Returns true while a frame header has been read but its payload is incomplete
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.decoder_state, DecoderState::Payload(_))
    }

    fn encode_payload(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<(), CodecError> {
        if payload.len() > self.max_frame_length || payload.len() > u32::MAX as usize {
            warn!(
                length = payload.len(),
                max = self.max_frame_length,
                "Refusing to encode oversized frame"
            );
            return Err(CodecError::FrameTooLarge {
                length: payload.len(),
                max: self.max_frame_length,
            });
        }

        let mut header = [0u8; HEADER_LENGTH];
        BigEndian::write_u32(&mut header, payload.len() as u32);

        dst.reserve(HEADER_LENGTH + payload.len());
        dst.put_slice(&header);
        dst.put_slice(payload);
        trace!(length = payload.len(), "Encoded frame");
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    /// Decodes one frame from `src`.
    ///
    /// # Returns
    /// - `Ok(Some(payload))`: a complete frame was available and has been consumed.
    /// - `Ok(None)`: more bytes are needed; any consumed header is remembered.
    /// - `Err(CodecError::FrameTooLarge)`: the announced length exceeds the limit.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        let length = match self.decoder_state {
            DecoderState::Header => {
                if src.len() < HEADER_LENGTH {
                    return Ok(None);
                }
                let length = BigEndian::read_u32(&src[..HEADER_LENGTH]) as usize;
                if length > self.max_frame_length {
                    warn!(
                        length,
                        max = self.max_frame_length,
                        "Peer announced oversized frame"
                    );
                    return Err(CodecError::FrameTooLarge {
                        length,
                        max: self.max_frame_length,
                    });
                }
                src.advance(HEADER_LENGTH);
                src.reserve(length);
                self.decoder_state = DecoderState::Payload(length);
                length
            }
            DecoderState::Payload(length) => length,
        };

        if src.len() < length {
            return Ok(None);
        }

        self.decoder_state = DecoderState::Header;
        let payload = src.split_to(length).freeze();
        src.reserve(HEADER_LENGTH);
        trace!(length, "Decoded frame");
        Ok(Some(payload))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_payload(&item, dst)
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_payload(item, dst)
    }
}

impl Encoder<&str> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_payload(item.as_bytes(), dst)
    }
}

impl Encoder<String> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_payload(item.as_bytes(), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> BytesMut {
        let mut buffer = BytesMut::new();
        buffer.put_u32(payload.len() as u32);
        buffer.put_slice(payload);
        buffer
    }

    #[test]
    fn test_encode_writes_big_endian_prefix() {
        let mut codec = FrameCodec::new();
        let mut buffer = BytesMut::new();
        codec.encode("hello", &mut buffer).unwrap();
        assert_eq!(&buffer[..], b"\x00\x00\x00\x05hello");
    }

    #[test]
    fn test_encode_does_not_append_line_endings() {
        let mut codec = FrameCodec::new();
        let mut buffer = BytesMut::new();
        codec.encode(String::from("NICK"), &mut buffer).unwrap();
        assert_eq!(buffer.len(), HEADER_LENGTH + 4);
        assert!(!buffer.ends_with(b"\r\n"));
    }

    #[test]
    fn test_decode_waits_for_header() {
        let mut codec = FrameCodec::new();
        let mut buffer = BytesMut::from(&b"\x00\x00"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert!(!codec.is_mid_frame());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_decode_partial_payload() {
        let mut codec = FrameCodec::new();
        let mut buffer = BytesMut::from(&b"\x00\x00\x00\x05hel"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert!(codec.is_mid_frame());

        buffer.put_slice(b"lo");
        let payload = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&payload[..], b"hello");
        assert!(!codec.is_mid_frame());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_coalesced_frames() {
        let mut codec = FrameCodec::new();
        let mut buffer = frame(b"alice: hi");
        buffer.unsplit(frame(b"bob: hey"));

        assert_eq!(&codec.decode(&mut buffer).unwrap().unwrap()[..], b"alice: hi");
        assert_eq!(&codec.decode(&mut buffer).unwrap().unwrap()[..], b"bob: hey");
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_decode_empty_frame() {
        let mut codec = FrameCodec::new();
        let mut buffer = frame(b"");
        let payload = codec.decode(&mut buffer).unwrap().unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut codec = FrameCodec::with_max_frame_length(16);
        let mut buffer = BytesMut::new();
        buffer.put_u32(17);
        let err = codec.decode(&mut buffer).unwrap_err();
        assert_eq!(err, CodecError::FrameTooLarge { length: 17, max: 16 });
    }

    #[test]
    fn test_encode_rejects_oversized_frame() {
        let mut codec = FrameCodec::with_max_frame_length(4);
        let mut buffer = BytesMut::new();
        let err = codec.encode("too long", &mut buffer).unwrap_err();
        assert!(err.is_frame_too_large());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_max_length_frame_is_accepted() {
        let mut codec = FrameCodec::with_max_frame_length(8);
        let mut buffer = BytesMut::new();
        codec.encode(&b"12345678"[..], &mut buffer).unwrap();
        assert_eq!(&codec.decode(&mut buffer).unwrap().unwrap()[..], b"12345678");
    }
}
