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

//! Routing of decoded packets to their consumer.
//!
//! While the target runs, the stub may interleave any number of console
//! output packets (`O<hex>`) before the stop reply that ends the run. While
//! a command is pending the next packet is its reply, except for console
//! output produced by monitor commands.

use crate::client::State;
use crate::error::ProtocolError;
use crate::packet;
use crate::stop_reply;

/// Where a decoded packet went.
#[derive(Debug, PartialEq, Eq)]
pub enum Routed {
    /// The reply to the pending command.
    Reply(Vec<u8>),
    /// Console output, appended to the console or monitor buffer.
    Console,
    /// The stop reply that ends the running episode, together with the
    /// console output collected since the last one.
    Stop { stop_reply: String, console: String },
}

/// Console text is kept apart by origin: `console` collects output of the
/// current running episode and is handed out with its stop reply, `monitor`
/// collects output produced while a command was pending.
#[derive(Debug, Default)]
pub struct Demultiplexer {
    console: String,
    monitor: String,
}

impl Demultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `payload` according to the engine `state` it arrived in.
    pub fn route(&mut self, state: State, payload: Vec<u8>) -> Result<Routed, ProtocolError> {
        match state {
            State::Running => self.route_running(payload),
            State::AwaitingReply => {
                if let Some(text) = console_fragment(&payload) {
                    log::debug!("monitor output: {text:?}");
                    self.monitor.push_str(&text);
                    Ok(Routed::Console)
                } else {
                    Ok(Routed::Reply(payload))
                }
            }
            State::Connected | State::Disconnected => Err(unexpected(state, &payload)),
        }
    }

    fn route_running(&mut self, payload: Vec<u8>) -> Result<Routed, ProtocolError> {
        if let Some(hex_text) = payload.strip_prefix(b"O") {
            let text = packet::decode_hex_text(hex_text)
                .map_err(|_| ProtocolError::InvalidConsoleOutput)?;
            log::debug!("console output: {text:?}");
            self.console.push_str(&text);
            return Ok(Routed::Console);
        }

        if !stop_reply::is_stop_reply(&payload) {
            return Err(unexpected(State::Running, &payload));
        }
        if !payload.is_ascii() {
            return Err(ProtocolError::NonAsciiReply);
        }
        let stop_reply = String::from_utf8(payload).map_err(|_| ProtocolError::NonAsciiReply)?;
        let console = self.take_console();
        log::debug!(
            "stop reply {stop_reply:?} with {} bytes of console output",
            console.len()
        );
        Ok(Routed::Stop {
            stop_reply,
            console,
        })
    }

    /// Drains the console buffer of the current running episode.
    pub fn take_console(&mut self) -> String {
        core::mem::take(&mut self.console)
    }

    /// Drains output collected while commands were pending.
    pub fn take_monitor_output(&mut self) -> String {
        core::mem::take(&mut self.monitor)
    }

    pub fn clear(&mut self) {
        self.console.clear();
        self.monitor.clear();
    }
}

/// Recognises `O<hex>` console output among command replies. `OK` and other
/// replies starting with `O` do not decode as hex text and pass through.
fn console_fragment(payload: &[u8]) -> Option<String> {
    match payload.strip_prefix(b"O") {
        Some(hex_text) if !hex_text.is_empty() => packet::decode_hex_text(hex_text).ok(),
        _ => None,
    }
}

fn unexpected(state: State, payload: &[u8]) -> ProtocolError {
    ProtocolError::UnexpectedPacket {
        state,
        payload: String::from_utf8_lossy(payload).into_owned(),
    }
}
