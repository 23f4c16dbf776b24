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

//! Framed client connection
//!
//! A [`RelayConnection`] is the transport seen by the acceptor and the session worker:
//! it sends and receives whole frames and reports connection loss. It works over any
//! `AsyncRead + AsyncWrite` stream, which keeps the acceptor and worker testable over
//! in-memory pipes.

use crate::{RelayError, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use parley_codec::FrameCodec;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, instrument, trace, warn};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A framed connection to one chat client
///
/// The connection is owned by exactly one task at a time: the acceptor during the
/// handshake, then the session's worker. Other components reach the client through
/// the session's outbound queue, never through this handle.
pub struct RelayConnection {
    reader: FramedRead<BoxedReader, FrameCodec>,
    writer: FramedWrite<BoxedWriter, FrameCodec>,

    peer_addr: Option<SocketAddr>,
    created_at: Instant,
    closed: bool,

    bytes_sent: u64,
    bytes_received: u64,
    messages_sent: u64,
    messages_received: u64,
}

impl RelayConnection {
    /// Wrap an accepted TCP stream
    #[instrument(skip(socket))]
    pub fn wrap(socket: TcpStream, max_frame_length: usize) -> Result<Self> {
        let peer_addr = socket.peer_addr()?;
        socket.set_nodelay(true)?;
        debug!(peer_addr = %peer_addr, "Creating new relay connection");
        let (reader, writer) = socket.into_split();
        Ok(Self::from_parts(
            Box::new(reader),
            Box::new(writer),
            Some(peer_addr),
            max_frame_length,
        ))
    }

    /// Wrap any bidirectional byte stream
    pub fn new<S>(stream: S, peer_addr: Option<SocketAddr>, max_frame_length: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::from_parts(
            Box::new(reader),
            Box::new(writer),
            peer_addr,
            max_frame_length,
        )
    }

    fn from_parts(
        reader: BoxedReader,
        writer: BoxedWriter,
        peer_addr: Option<SocketAddr>,
        max_frame_length: usize,
    ) -> Self {
        gauge!("parley.connections.open").increment(1.0);
        Self {
            reader: FramedRead::new(reader, FrameCodec::with_max_frame_length(max_frame_length)),
            writer: FramedWrite::new(writer, FrameCodec::with_max_frame_length(max_frame_length)),
            peer_addr,
            created_at: Instant::now(),
            closed: false,
            bytes_sent: 0,
            bytes_received: 0,
            messages_sent: 0,
            messages_received: 0,
        }
    }

    /// Allow outgoing frames of up to `length` bytes
    ///
    /// Incoming frames keep the limit given at construction.
    pub fn with_max_outbound_frame_length(mut self, length: usize) -> Self {
        *self.writer.encoder_mut() = FrameCodec::with_max_frame_length(length);
        self
    }

    /// Get the peer address, when the transport has one
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Get when the connection was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Check whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get payload bytes sent
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Get payload bytes received
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Get frames sent
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Get frames received
    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    /// Send one frame and flush it
    #[instrument(skip(self, payload), fields(length = payload.len()))]
    pub async fn send(&mut self, payload: Bytes) -> Result<()> {
        if self.closed {
            return Err(RelayError::ConnectionClosed);
        }

        let start = Instant::now();
        let length = payload.len() as u64;
        match self.writer.send(payload).await {
            Ok(()) => {
                self.messages_sent += 1;
                self.bytes_sent += length;
                counter!("parley.messages.sent").increment(1);
                histogram!("parley.message.send_duration").record(start.elapsed().as_secs_f64());
                trace!("Frame sent");
                Ok(())
            }
            Err(e) => {
                counter!("parley.errors.send").increment(1);
                warn!(error = %e, "Failed to send frame");
                Err(e.into())
            }
        }
    }

    /// Send a text frame
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(Bytes::copy_from_slice(text.as_bytes())).await
    }

    /// Receive the next frame
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly. This method is
    /// cancel safe: partially received frames stay buffered.
    #[instrument(skip(self))]
    pub async fn receive(&mut self) -> Result<Option<Bytes>> {
        match self.reader.next().await {
            Some(Ok(payload)) => {
                self.messages_received += 1;
                self.bytes_received += payload.len() as u64;
                counter!("parley.frames.received").increment(1);
                trace!(length = payload.len(), "Frame received");
                Ok(Some(payload))
            }
            Some(Err(e)) => {
                counter!("parley.errors.receive").increment(1);
                debug!(error = %e, "Error receiving frame");
                Err(e.into())
            }
            None => {
                debug!("Connection stream ended");
                Ok(None)
            }
        }
    }

    /// Flush and shut down the write side
    ///
    /// Idempotent: closing an already closed connection does nothing.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        gauge!("parley.connections.open").decrement(1.0);
        SinkExt::<Bytes>::close(&mut self.writer).await?;
        Ok(())
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        if !self.closed {
            gauge!("parley.connections.open").decrement(1.0);
        }
    }
}

impl std::fmt::Debug for RelayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConnection")
            .field("peer_addr", &self.peer_addr)
            .field("created_at", &self.created_at)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_codec::DEFAULT_MAX_FRAME_LENGTH;
    use tokio::io::AsyncWriteExt;

    fn pair() -> (RelayConnection, RelayConnection) {
        let (a, b) = tokio::io::duplex(4096);
        (
            RelayConnection::new(a, None, DEFAULT_MAX_FRAME_LENGTH),
            RelayConnection::new(b, None, DEFAULT_MAX_FRAME_LENGTH),
        )
    }

    #[tokio::test]
    async fn test_send_receive() {
        let (mut server, mut client) = pair();

        server.send_text("NICK").await.unwrap();
        assert_eq!(client.receive().await.unwrap().unwrap(), "NICK");

        client.send_text("alice").await.unwrap();
        assert_eq!(server.receive().await.unwrap().unwrap(), "alice");

        assert_eq!(server.messages_sent(), 1);
        assert_eq!(server.messages_received(), 1);
        assert_eq!(server.bytes_received(), 5);
    }

    #[tokio::test]
    async fn test_close_is_observed_as_eof() {
        let (mut server, mut client) = pair();

        server.close().await.unwrap();
        assert!(server.is_closed());
        assert_eq!(client.receive().await.unwrap(), None);

        // Second close is a no-op
        server.close().await.unwrap();
        assert!(matches!(
            server.send_text("late").await,
            Err(RelayError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_garbage_is_a_codec_error() {
        let (stream, mut raw) = tokio::io::duplex(64);
        let mut connection = RelayConnection::new(stream, None, 16);

        raw.write_all(b"\xFF\xFF\xFF\xFF").await.unwrap();
        assert!(matches!(
            connection.receive().await,
            Err(RelayError::Codec(_))
        ));
    }
}
