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

//! Framed reads and writes on one open stream.

use std::future::Future;
use std::time::Duration;

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use futures::FutureExt;

use crate::ack::{Ack, AckController, AckMode, ReceiveAction, SendOutcome};
use crate::config::ClientConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::packet;

/// Maximum number of bytes pulled from the stream in one read.
const RECV_BLOCK_SIZE: usize = 1024;

/// Sent outside of packet framing to interrupt a running target.
const INTERRUPT: u8 = 0x03;

/// Runs `fut`, failing with [`Error::Timeout`] once `after` has elapsed.
pub(crate) async fn with_timeout<T>(
    after: Duration,
    waiting_for: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Error::Timeout { waiting_for, after })?
}

/// An open stream plus the bytes received but not yet consumed.
///
/// Every read is a single `read()` into `rx`, so a read abandoned on timeout
/// loses nothing: a partially received packet stays buffered for the next
/// attempt. A complete packet leaves `rx` only after its acknowledgement was
/// written, so an abandoned acknowledgement is sent again on the next attempt.
pub(crate) struct Connection<S> {
    stream: S,
    rx: Vec<u8>,
    ack: AckController,
    ack_timeout: Duration,
    max_packet_size: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S, config: &ClientConfig) -> Self {
        Self {
            stream,
            rx: Vec::new(),
            ack: AckController::new(config.max_retransmits),
            ack_timeout: config.ack_timeout,
            max_packet_size: config.max_packet_size,
        }
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack.mode()
    }

    pub fn set_ack_mode(&mut self, mode: AckMode) {
        self.ack.set_mode(mode);
    }

    /// Frames and sends `payload`, resending it for every `-` received.
    pub async fn send_packet(&mut self, payload: &[u8]) -> Result<()> {
        let frame = packet::encode(payload);
        let mut retransmits = 0;
        loop {
            log::trace!("-> {}", String::from_utf8_lossy(&frame));
            self.write(&frame).await?;
            if !self.ack.acks_required() {
                return Ok(());
            }

            let byte = self.read_ack_byte().await?;
            match self.ack.after_send(byte, retransmits)? {
                SendOutcome::Delivered => return Ok(()),
                SendOutcome::Retransmit => {
                    retransmits += 1;
                    log::warn!("packet rejected by remote, retransmitting ({retransmits})");
                }
            }
        }
    }

    /// Sends `payload` once with an explicit checksum and reports the raw
    /// acknowledgement, if acknowledgements are enabled.
    pub async fn send_with_checksum(&mut self, payload: &[u8], checksum: u8) -> Result<Option<Ack>> {
        let frame = packet::encode_with_checksum(payload, checksum);
        log::trace!("-> {}", String::from_utf8_lossy(&frame));
        self.write(&frame).await?;
        if !self.ack.acks_required() {
            return Ok(None);
        }
        let byte = self.read_ack_byte().await?;
        Ack::from_byte(byte)
            .map(Some)
            .ok_or(ProtocolError::UnexpectedAckByte(byte).into())
    }

    pub async fn send_interrupt(&mut self) -> Result<()> {
        log::trace!("-> ^C");
        self.write(&[INTERRUPT]).await
    }

    /// Reads the next packet and returns its decoded payload.
    ///
    /// With acknowledgements enabled a corrupted packet is answered with `-`
    /// and the retransmission awaited; without them it cannot be recovered.
    pub async fn receive_payload(&mut self) -> Result<Vec<u8>> {
        let mut rejected = 0;
        loop {
            let end = self.read_frame().await?;
            let frame = &self.rx[..end];
            log::trace!("<- {}", String::from_utf8_lossy(frame));
            let decoded = packet::decode(frame);
            match self.ack.after_receive(&decoded, rejected) {
                ReceiveAction::Accept(ack) => {
                    if let Some(ack) = ack {
                        self.write(&[ack.as_byte()]).await?;
                    }
                    self.rx.drain(..end);
                    return decoded.map_err(Error::from);
                }
                ReceiveAction::Reject => {
                    if let Err(err) = &decoded {
                        log::warn!("rejecting packet: {err}");
                    }
                    self.write(&[Ack::Negative.as_byte()]).await?;
                    self.rx.drain(..end);
                    rejected += 1;
                }
                ReceiveAction::Fail => {
                    self.rx.drain(..end);
                    return decoded.map_err(Error::from);
                }
            }
        }
    }

    /// Returns a packet the stub sent while nothing was outstanding, such as
    /// the reply to a command that timed out.
    ///
    /// Only looks at bytes already received or ready to be read; waits for
    /// more only to complete a packet that has started arriving.
    pub async fn take_unsolicited(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(filled) = self.fill().now_or_never() {
            filled?;
        }
        self.discard_stray_acks();
        if self.rx.is_empty() {
            return Ok(None);
        }
        self.receive_payload().await.map(Some)
    }

    /// Closes the underlying stream.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.stream.close().await
    }

    async fn read_ack_byte(&mut self) -> Result<u8> {
        let ack_timeout = self.ack_timeout;
        with_timeout(ack_timeout, "acknowledgement", async {
            if self.rx.is_empty() {
                self.fill().await?;
            }
            Ok(self.rx.remove(0))
        })
        .await
    }

    /// Waits until `rx` starts with a complete `$...#hh` frame and returns
    /// its length. The frame stays in `rx`.
    async fn read_frame(&mut self) -> Result<usize> {
        loop {
            self.discard_stray_acks();
            match self.rx.first().copied() {
                None => {
                    self.fill().await?;
                    continue;
                }
                Some(b'$') => {}
                Some(other) => {
                    self.rx.remove(0);
                    return Err(ProtocolError::UnexpectedByte(other).into());
                }
            }

            let end = self.rx.iter().position(|&b| b == b'#').map(|hash| hash + 3);
            let too_large = match end {
                Some(end) => end > self.max_packet_size,
                None => self.rx.len() > self.max_packet_size,
            };
            if too_large {
                self.rx.clear();
                return Err(ProtocolError::PacketTooLarge {
                    limit: self.max_packet_size,
                }
                .into());
            }
            if let Some(end) = end.filter(|&end| end <= self.rx.len()) {
                return Ok(end);
            }
            self.fill().await?;
        }
    }

    /// Drops `+`/`-` bytes sitting between packets. Stubs may keep sending
    /// them for a while after no-ack mode was negotiated.
    fn discard_stray_acks(&mut self) {
        let stray = self
            .rx
            .iter()
            .take_while(|&&b| Ack::from_byte(b).is_some())
            .count();
        if stray == 0 {
            return;
        }
        if self.ack.acks_required() {
            log::warn!("discarding {stray} unexpected acknowledgement byte(s)");
        } else {
            log::debug!("discarding {stray} acknowledgement byte(s) in no-ack mode");
        }
        self.rx.drain(..stray);
    }

    async fn fill(&mut self) -> Result<()> {
        let mut buf = [0u8; RECV_BLOCK_SIZE];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        self.rx.extend_from_slice(&buf[..n]);
        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
