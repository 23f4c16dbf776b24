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

//! Interactive Chat Client Demo
//!
//! Prompts for a nickname, prints everything the room says, and sends each
//! line typed on stdin. Type `/quit` to leave.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p parley-client --example chat_client -- 127.0.0.1 55555
//! ```

use parley_client::{ChatClient, ChatMessage, ClientConfig, QUIT_COMMAND};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let host = args.get(1).map(|s| s.as_str()).unwrap_or("127.0.0.1");
    let port: u16 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(55555);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("Choose your nickname: ");
    std::io::stdout().flush()?;
    let nickname = lines.next_line().await?.unwrap_or_default();

    let config = ClientConfig::new(host, port).with_nickname(nickname.trim());
    let client = match ChatClient::connect(config).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let (mut reader, mut writer) = client.split();

    // Print incoming messages until the server closes the connection
    let mut printer = tokio::spawn(async move {
        loop {
            match reader.next_message().await {
                Ok(Some(ChatMessage::System(notice))) => println!("* {}", notice),
                Ok(Some(message)) => println!("{}", message),
                Ok(None) => break,
                Err(e) => {
                    eprintln!("Connection error: {}", e);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim_end() == QUIT_COMMAND => {
                        writer.quit().await?;
                        break;
                    }
                    Some(line) => writer.send(&line).await?,
                    None => {
                        writer.quit().await?;
                        break;
                    }
                }
            }
            _ = &mut printer => {
                println!("Disconnected from server");
                return Ok(());
            }
        }
    }

    let _ = printer.await;
    Ok(())
}
