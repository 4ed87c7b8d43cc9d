// Copyright 2025 The Pigweed Authors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gdb_remote_client::{Ack, Client, ClientConfig, StopReason, TcpTransport};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GDB server address (default: localhost:1234)
    #[arg(short, long, default_value = "localhost:1234")]
    addr: String,

    /// Negotiate no-ack mode before running the command
    #[arg(long)]
    no_ack: bool,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// How often a rejected packet is resent
    #[arg(long, default_value_t = 3)]
    retransmits: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a packet and print the reply
    Cmd {
        /// Packet payload, e.g. qSupported
        packet: String,
    },
    /// Resume the target and wait for it to stop
    Run {
        /// Packet payload, e.g. vCont;c
        #[arg(default_value = "c")]
        packet: String,

        /// Interrupt the target after this many milliseconds
        #[arg(long)]
        interrupt_after_ms: Option<u64>,
    },
    /// Send a packet with a deliberately chosen checksum and print the ack
    SendChecksum {
        packet: String,

        /// Checksum to send (hex or decimal)
        #[arg(value_parser = parse_int)]
        checksum: u8,
    },
}

fn parse_int(s: &str) -> Result<u8, String> {
    if let Some(hex_str) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex_str, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u8>().map_err(|e| e.to_string())
    }
}


async fn run(client: &mut Client<TcpTransport>, command: Commands) -> Result<()> {
    match command {
        Commands::Cmd { packet } => {
            let reply = client.cmd(&packet).await?;
            let console = client.take_console_output();
            if !console.is_empty() {
                print!("{console}");
            }
            println!("{reply}");
        }
        Commands::Run {
            packet,
            interrupt_after_ms,
        } => {
            client.cmd_no_reply(&packet).await?;
            if let Some(ms) = interrupt_after_ms {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                client.ctrl_c().await.context("Failed to interrupt target")?;
            }
            let (stop_reply, console) = client.get_stop_reply().await?;
            print!("{console}");
            match StopReason::parse(&stop_reply) {
                Some(reason) => println!("{stop_reply} ({reason:?})"),
                None => println!("{stop_reply}"),
            }
        }
        Commands::SendChecksum { packet, checksum } => {
            match client.send_with_checksum(packet.as_bytes(), checksum).await? {
                Some(Ack::Positive) => println!("+"),
                Some(Ack::Negative) => println!("-"),
                None => println!("(no-ack mode)"),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = ClientConfig {
        reply_timeout: Duration::from_millis(cli.timeout_ms),
        max_retransmits: cli.retransmits,
        ..ClientConfig::default()
    };
    let mut client = Client::with_config(TcpTransport::new(&cli.addr), config);
    client
        .connect()
        .await
        .context(format!("Failed to connect to GDB server at {}", cli.addr))?;

    if cli.no_ack {
        let reply = client.cmd("QStartNoAckMode").await?;
        if reply == "OK" {
            client.set_no_ack_mode(true)?;
        } else {
            log::warn!("stub refused no-ack mode: {reply:?}");
        }
    }

    let result = run(&mut client, cli.command).await;
    client.disconnect().await?;
    result
}
