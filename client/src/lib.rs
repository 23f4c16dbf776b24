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

//! # Parley Chat Client
//!
//! Client library for the Parley chat relay.
//!
//! ## Features
//!
//! - **Handshake** - Answers the server's identity request and reports refusals
//! - **Typed Messages** - Server notices and relayed chat are told apart
//! - **Split Halves** - Read and write from independent tasks
//! - **Async-First** - Built on Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use parley_client::{ChatClient, ChatMessage, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("127.0.0.1", 55555).with_nickname("alice");
//!     let client = ChatClient::connect(config).await?;
//!     let (mut reader, mut writer) = client.split();
//!
//!     tokio::spawn(async move {
//!         while let Ok(Some(message)) = reader.next_message().await {
//!             match message {
//!                 ChatMessage::Chat { sender, text } => println!("<{}> {}", sender, text),
//!                 other => println!("{}", other),
//!             }
//!         }
//!     });
//!
//!     writer.send("hello everyone").await?;
//!     writer.quit().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;

pub use client::{
    ChatClient, ChatMessage, ChatReader, ChatWriter, NICK_REQUEST, QUIT_COMMAND, SYSTEM_PREFIX,
};
pub use config::{ClientConfig, DEFAULT_MAX_INCOMING_FRAME_LENGTH};
pub use error::{ClientError, Result};
