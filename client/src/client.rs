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

//! Chat client implementation

use crate::{ClientConfig, ClientError, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parley_codec::FrameCodec;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, trace};

/// Identity request the server opens every connection with
pub const NICK_REQUEST: &str = "NICK";

/// Prefix of server notices
pub const SYSTEM_PREFIX: &str = "Server: ";

/// Chat text that ends the session
pub const QUIT_COMMAND: &str = "/quit";

/// Prefix the server puts on refusal notices
const ERROR_MARKER: &str = "ERROR!";

/// A message received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    /// Server notice, without the `"Server: "` prefix
    System(String),
    /// Message relayed from another participant
    Chat {
        /// Who sent it
        sender: String,
        /// What they said
        text: String,
    },
    /// Anything that follows neither convention
    Other(String),
}

impl ChatMessage {
    /// Classify a frame received from the server
    pub fn parse(frame: &[u8]) -> Self {
        let text = String::from_utf8_lossy(frame);
        if let Some(notice) = text.strip_prefix(SYSTEM_PREFIX) {
            return Self::System(notice.to_string());
        }
        if let Some((sender, body)) = text.split_once(": ") {
            if !sender.is_empty() {
                return Self::Chat {
                    sender: sender.to_string(),
                    text: body.to_string(),
                };
            }
        }
        Self::Other(text.into_owned())
    }

    /// Check if this is a server notice reporting an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::System(notice) if notice.starts_with(ERROR_MARKER))
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System(notice) => write!(f, "{}{}", SYSTEM_PREFIX, notice),
            Self::Chat { sender, text } => write!(f, "{}: {}", sender, text),
            Self::Other(text) => write!(f, "{}", text),
        }
    }
}

/// Receiving half of a chat connection
pub struct ChatReader {
    frames: FramedRead<OwnedReadHalf, FrameCodec>,
    read_timeout: Option<Duration>,
    pending: Option<ChatMessage>,
}

impl ChatReader {
    fn new(reader: OwnedReadHalf, config: &ClientConfig) -> Self {
        Self {
            frames: FramedRead::new(
                reader,
                FrameCodec::with_max_frame_length(config.max_incoming_frame_length),
            ),
            read_timeout: config.read_timeout,
            pending: None,
        }
    }

    /// Wait for the next message
    ///
    /// Returns `Ok(None)` once the server has closed the connection.
    pub async fn next_message(&mut self) -> Result<Option<ChatMessage>> {
        if let Some(message) = self.pending.take() {
            return Ok(Some(message));
        }
        let frame = match self.read_timeout {
            Some(limit) => self.next_frame_within(limit).await?,
            None => self.next_frame().await?,
        };
        Ok(frame.map(|frame| ChatMessage::parse(&frame)))
    }

    async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        match self.frames.next().await {
            Some(Ok(frame)) => {
                trace!(length = frame.len(), "Frame received");
                Ok(Some(frame))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn next_frame_within(&mut self, limit: Duration) -> Result<Option<Bytes>> {
        timeout(limit, self.next_frame())
            .await
            .map_err(|_| ClientError::ReadTimeout)?
    }
}

impl fmt::Debug for ChatReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatReader")
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// Sending half of a chat connection
pub struct ChatWriter {
    frames: FramedWrite<OwnedWriteHalf, FrameCodec>,
}

impl ChatWriter {
    fn new(writer: OwnedWriteHalf, config: &ClientConfig) -> Self {
        Self {
            frames: FramedWrite::new(writer, FrameCodec::with_max_frame_length(config.max_frame_length)),
        }
    }

    /// Send a chat message
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.frames.send(text).await?;
        Ok(())
    }

    /// Leave the chat and close the connection
    pub async fn quit(mut self) -> Result<()> {
        self.send(QUIT_COMMAND).await?;
        SinkExt::<&str>::close(&mut self.frames).await?;
        Ok(())
    }
}

impl fmt::Debug for ChatWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatWriter").finish()
    }
}

/// Connected chat client
///
/// # Example
///
/// ```no_run
/// use parley_client::{ChatClient, ClientConfig};
///
/// # async fn example() -> parley_client::Result<()> {
/// let config = ClientConfig::new("127.0.0.1", 55555).with_nickname("alice");
/// let mut client = ChatClient::connect(config).await?;
///
/// client.send("hello everyone").await?;
/// while let Some(message) = client.next_message().await? {
///     println!("{}", message);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChatClient {
    nickname: String,
    reader: ChatReader,
    writer: ChatWriter,
}

impl ChatClient {
    /// Connect to the server and register the configured nickname
    ///
    /// Connecting and the identity handshake are each bounded by `connect_timeout`.
    /// When the server refuses the nickname this returns
    /// [`ClientError::NameRejected`] with the server's notice.
    #[instrument(skip(config), fields(address = %config.address(), nickname = %config.nickname))]
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(config.address()))
            .await
            .map_err(|_| ClientError::ConnectionTimeout)??;
        stream.set_nodelay(true)?;
        debug!("Connected, waiting for identity request");

        let (reader, writer) = stream.into_split();
        let mut reader = ChatReader::new(reader, &config);
        let mut writer = ChatWriter::new(writer, &config);

        match reader.next_frame_within(config.connect_timeout).await? {
            Some(frame) if frame == NICK_REQUEST => {}
            Some(frame) => {
                return Err(ClientError::UnexpectedGreeting(
                    String::from_utf8_lossy(&frame).into_owned(),
                ));
            }
            None => return Err(ClientError::ConnectionClosed),
        }

        writer.send(&config.nickname).await?;

        // The server either refuses the name or announces it to the room.
        match reader.next_frame_within(config.connect_timeout).await? {
            Some(frame) => {
                let message = ChatMessage::parse(&frame);
                if message.is_error() {
                    return Err(ClientError::NameRejected(message.to_string()));
                }
                reader.pending = Some(message);
            }
            None => return Err(ClientError::ConnectionClosed),
        }

        info!("Joined the chat");
        Ok(Self {
            nickname: config.nickname,
            reader,
            writer,
        })
    }

    /// Get the nickname this client registered
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Send a chat message
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.writer.send(text).await
    }

    /// Wait for the next message; `Ok(None)` once the server closed the connection
    pub async fn next_message(&mut self) -> Result<Option<ChatMessage>> {
        self.reader.next_message().await
    }

    /// Leave the chat and close the connection
    pub async fn quit(self) -> Result<()> {
        self.writer.quit().await
    }

    /// Split into independent reading and writing halves
    pub fn split(self) -> (ChatReader, ChatWriter) {
        (self.reader, self.writer)
    }
}
