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

use core::fmt;
use std::time::Duration;

use crate::ack::{Ack, AckMode};
use crate::config::ClientConfig;
use crate::connection::{with_timeout, Connection};
use crate::demux::{Demultiplexer, Routed};
use crate::error::{Error, ProtocolError, Result};
use crate::transport::Transport;

/// Lifecycle of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disconnected,
    /// Idle, no command outstanding.
    Connected,
    /// A command was sent and its reply has not arrived yet.
    AwaitingReply,
    /// The target was resumed and no stop reply has arrived yet.
    Running,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Disconnected => "disconnected",
            State::Connected => "connected",
            State::AwaitingReply => "awaiting a reply",
            State::Running => "running",
        })
    }
}

/// A client for driving a GDB server (stub).
///
/// Operations are only valid in particular [`State`]s and fail with
/// [`ProtocolError::InvalidState`] otherwise. Which state follows is decided
/// by the class of packet received, never by the text of the command sent.
pub struct Client<T: Transport> {
    transport: T,
    config: ClientConfig,
    state: State,
    connection: Option<Connection<T::Stream>>,
    demux: Demultiplexer,
}

impl<T: Transport> Client<T> {
    /// Creates a disconnected `Client` using the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            state: State::Disconnected,
            connection: None,
            demux: Demultiplexer::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Acknowledgement mode of the current connection. A new connection
    /// always starts with acknowledgements required.
    pub fn ack_mode(&self) -> AckMode {
        self.connection
            .as_ref()
            .map_or(AckMode::Required, Connection::ack_mode)
    }

    /// Sets the deadline for command and stop replies.
    pub fn set_reply_timeout(&mut self, timeout: Duration) {
        self.config.reply_timeout = timeout;
    }

    /// Opens the transport.
    pub async fn connect(&mut self) -> Result<()> {
        self.expect_state("connect", State::Disconnected)?;
        let stream = self.transport.open().await.map_err(Error::Connection)?;
        self.connection = Some(Connection::new(stream, &self.config));
        self.demux.clear();
        self.transition(State::Connected);
        Ok(())
    }

    /// Closes the transport. Does nothing when already disconnected.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.demux.clear();
        self.transition(State::Disconnected);
        match self.connection.take() {
            Some(connection) => connection.close().await.map_err(Error::Connection),
            None => Ok(()),
        }
    }

    /// Sends `command` and returns the reply, which must be ASCII.
    pub async fn cmd(&mut self, command: &str) -> Result<String> {
        let reply = self.cmd_bin(command.as_bytes()).await?;
        if !reply.is_ascii() {
            return Err(ProtocolError::NonAsciiReply.into());
        }
        String::from_utf8(reply).map_err(|_| ProtocolError::NonAsciiReply.into())
    }

    /// Sends a binary `command` and returns the raw reply.
    pub async fn cmd_bin(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.expect_state("cmd", State::Connected)?;
        self.reject_unsolicited("cmd").await?;
        let result = self.exchange(command).await;
        self.transition(State::Connected);
        result
    }

    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        live(&mut self.connection, "cmd")?
            .send_packet(command)
            .await?;
        self.transition(State::AwaitingReply);

        let connection = live(&mut self.connection, "cmd")?;
        let demux = &mut self.demux;
        with_timeout(self.config.reply_timeout, "command reply", async move {
            loop {
                let payload = connection.receive_payload().await?;
                // Console output from monitor commands stays buffered.
                if let Routed::Reply(reply) = demux.route(State::AwaitingReply, payload)? {
                    return Ok(reply);
                }
            }
        })
        .await
    }

    /// Sends a command that resumes the target, such as `c` or `vCont;s`.
    ///
    /// No reply is read; the client is [`State::Running`] until
    /// [`get_stop_reply`](Self::get_stop_reply) returns.
    pub async fn cmd_no_reply(&mut self, command: &str) -> Result<()> {
        self.cmd_no_reply_bin(command.as_bytes()).await
    }

    pub async fn cmd_no_reply_bin(&mut self, command: &[u8]) -> Result<()> {
        self.expect_state("cmd_no_reply", State::Connected)?;
        self.reject_unsolicited("cmd_no_reply").await?;
        live(&mut self.connection, "cmd_no_reply")?
            .send_packet(command)
            .await?;
        self.transition(State::Running);
        Ok(())
    }

    /// Waits for the target to stop.
    ///
    /// Returns the stop reply together with the console output the target
    /// printed while running. On error the client stays running, so the
    /// caller may interrupt the target and try again.
    pub async fn get_stop_reply(&mut self) -> Result<(String, String)> {
        self.expect_state("get_stop_reply", State::Running)?;
        let connection = live(&mut self.connection, "get_stop_reply")?;
        let demux = &mut self.demux;
        let stopped = with_timeout(self.config.reply_timeout, "stop reply", async move {
            loop {
                let payload = connection.receive_payload().await?;
                if let Routed::Stop {
                    stop_reply,
                    console,
                } = demux.route(State::Running, payload)?
                {
                    return Ok((stop_reply, console));
                }
            }
        })
        .await?;
        self.transition(State::Connected);
        Ok(stopped)
    }

    /// Interrupts the running target.
    ///
    /// The stop reply it causes is collected by
    /// [`get_stop_reply`](Self::get_stop_reply).
    pub async fn ctrl_c(&mut self) -> Result<()> {
        self.expect_state("ctrl_c", State::Running)?;
        live(&mut self.connection, "ctrl_c")?.send_interrupt().await
    }

    /// Turns acknowledgements off for the rest of the connection.
    ///
    /// Only call this after `QStartNoAckMode` was answered with `OK`.
    /// Changing the mode without the stub's agreement desynchronises the
    /// ack accounting of both sides.
    pub fn set_no_ack_mode(&mut self, enabled: bool) -> Result<()> {
        self.expect_state("set_no_ack_mode", State::Connected)?;
        let mode = if enabled {
            AckMode::Disabled
        } else {
            AckMode::Required
        };
        live(&mut self.connection, "set_no_ack_mode")?.set_ack_mode(mode);
        log::debug!("ack mode: {mode:?}");
        Ok(())
    }

    /// Sends `payload` once with the given checksum, without retransmitting,
    /// and returns the stub's acknowledgement (`None` in no-ack mode).
    ///
    /// Useful for checking that a stub rejects corrupted packets.
    pub async fn send_with_checksum(&mut self, payload: &[u8], checksum: u8) -> Result<Option<Ack>> {
        self.expect_state("send_with_checksum", State::Connected)?;
        live(&mut self.connection, "send_with_checksum")?
            .send_with_checksum(payload, checksum)
            .await
    }

    /// Drains console output received alongside command replies, e.g. from
    /// `qRcmd` monitor commands. Output of a running target is returned by
    /// [`get_stop_reply`](Self::get_stop_reply) instead.
    pub fn take_console_output(&mut self) -> String {
        self.demux.take_monitor_output()
    }

    /// Fails with [`ProtocolError::UnexpectedPacket`] if a packet arrived
    /// while the client was idle, e.g. the reply to a timed out command.
    /// The packet is consumed, so the following command is answered by its
    /// own reply.
    async fn reject_unsolicited(&mut self, operation: &'static str) -> Result<()> {
        let connection = live(&mut self.connection, operation)?;
        let unsolicited = with_timeout(
            self.config.reply_timeout,
            "unsolicited packet",
            connection.take_unsolicited(),
        )
        .await?;
        if let Some(payload) = unsolicited {
            self.demux.route(State::Connected, payload)?;
        }
        Ok(())
    }

    fn expect_state(&self, operation: &'static str, expected: State) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProtocolError::InvalidState {
                operation,
                state: self.state,
            }
            .into())
        }
    }

    fn transition(&mut self, next: State) {
        if self.state != next {
            log::debug!("{} -> {}", self.state, next);
        }
        self.state = next;
    }
}

fn live<'a, S>(
    connection: &'a mut Option<Connection<S>>,
    operation: &'static str,
) -> Result<&'a mut Connection<S>> {
    connection.as_mut().ok_or(
        ProtocolError::InvalidState {
            operation,
            state: State::Disconnected,
        }
        .into(),
    )
}
