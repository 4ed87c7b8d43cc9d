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

//! A client for the GDB remote serial protocol.
//!
//! This crate drives a GDB server (stub) the way GDB itself would, so that
//! stubs can be tested automatically. It handles packet framing,
//! acknowledgements and retransmission, no-ack mode, and separates console
//! output from the stop reply that ends a run. Command and reply bodies are
//! passed through untouched.
//!
//! The underlying byte stream is supplied by a [`Transport`]; streams use
//! the futures crate `AsyncRead` and `AsyncWrite` traits. [`TcpTransport`]
//! connects to a stub over TCP.
//!
//! This crate is targeted at host level tooling and is not intended for use in
//! embedded/no_std scenarios.
//!
//! # Example
//!
//! ```no_run
//! use gdb_remote_client::{Client, StopReason, TcpTransport};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(TcpTransport::new("localhost:1234"));
//!     client.connect().await?;
//!
//!     if client.cmd("QStartNoAckMode").await? == "OK" {
//!         client.set_no_ack_mode(true)?;
//!     }
//!
//!     client.cmd_no_reply("vCont;c").await?;
//!     let (stop_reply, console) = client.get_stop_reply().await?;
//!     println!("{console}");
//!     println!("stopped: {:?}", StopReason::parse(&stop_reply));
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

mod ack;
pub mod client;
mod config;
mod connection;
mod demux;
mod error;
pub mod packet;
mod stop_reply;
#[cfg(test)]
mod testing;
pub mod transport;

pub use ack::{Ack, AckMode};
pub use client::{Client, State};
pub use config::ClientConfig;
pub use error::{Error, PacketError, ProtocolError, Result};
pub use stop_reply::StopReason;
pub use transport::{TcpTransport, Transport};
