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

use std::io;
use std::time::Duration;

use crate::client::State;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Top level error returned by [`Client`](crate::Client) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport could not be opened or closed.
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),
    /// The remote end closed the stream.
    #[error("connection closed by remote")]
    ConnectionClosed,
    /// A received packet could not be decoded.
    #[error(transparent)]
    Packet(#[from] PacketError),
    /// The exchange violated the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Nothing arrived within the configured deadline.
    #[error("timed out after {after:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        after: Duration,
    },
    /// Transport read or write failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Errors produced by the packet codec.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PacketError {
    /// The frame does not follow the `$<payload>#<hh>` grammar.
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    /// The checksum in the frame does not match its contents.
    #[error("checksum mismatch: computed {expected:02x}, received {received:02x}")]
    ChecksumMismatch { expected: u8, received: u8 },
}

/// Protocol level contract violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("`{operation}` is not valid while {state}")]
    InvalidState {
        operation: &'static str,
        state: State,
    },
    #[error("unexpected packet {payload:?} while {state}")]
    UnexpectedPacket { state: State, payload: String },
    #[error("expected '$' at the start of a packet, found {0:#04x}")]
    UnexpectedByte(u8),
    #[error("expected '+' or '-' acknowledgement, found {0:#04x}")]
    UnexpectedAckByte(u8),
    #[error("packet rejected {attempts} times by remote")]
    RetransmitLimit { attempts: usize },
    #[error("packet exceeds {limit} bytes")]
    PacketTooLarge { limit: usize },
    #[error("expected an ASCII reply but received binary data")]
    NonAsciiReply,
    #[error("console output packet is not valid hex-encoded text")]
    InvalidConsoleOutput,
}
