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

//! Acknowledgement bookkeeping.
//!
//! The controller only makes decisions; the connection performs the reads
//! and writes they call for.

use crate::error::{PacketError, ProtocolError};

/// Whether packets are acknowledged with `+`/`-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Standard RSP behaviour, every packet is acknowledged.
    #[default]
    Required,
    /// Negotiated through `QStartNoAckMode`.
    Disabled,
}

/// A single acknowledgement byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Positive,
    Negative,
}

impl Ack {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'+' => Some(Ack::Positive),
            b'-' => Some(Ack::Negative),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Ack::Positive => b'+',
            Ack::Negative => b'-',
        }
    }
}

/// What to do after reading the acknowledgement for a sent packet.
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Retransmit,
}

/// What to do with a frame read from the remote.
#[derive(Debug, PartialEq, Eq)]
pub enum ReceiveAction {
    /// Hand the payload up, after writing the acknowledgement if any.
    Accept(Option<Ack>),
    /// Write `-` and wait for the retransmission.
    Reject,
    /// Give up and surface the decode error.
    Fail,
}

#[derive(Debug)]
pub struct AckController {
    mode: AckMode,
    max_retransmits: usize,
}

impl AckController {
    pub fn new(max_retransmits: usize) -> Self {
        Self {
            mode: AckMode::Required,
            max_retransmits,
        }
    }

    pub fn mode(&self) -> AckMode {
        self.mode
    }

    /// Switches the mode for every following send and receive.
    ///
    /// RSP has no way to turn acknowledgements back on, so this is only
    /// ever called with `Disabled` by a well-behaved caller. Changing the
    /// mode without the stub agreeing desynchronises the ack accounting.
    pub fn set_mode(&mut self, mode: AckMode) {
        self.mode = mode;
    }

    pub fn acks_required(&self) -> bool {
        self.mode == AckMode::Required
    }

    /// Interprets the byte read after sending a packet. `retransmits` is the
    /// number of times the packet has already been resent.
    pub fn after_send(&self, byte: u8, retransmits: usize) -> Result<SendOutcome, ProtocolError> {
        match Ack::from_byte(byte) {
            Some(Ack::Positive) => Ok(SendOutcome::Delivered),
            Some(Ack::Negative) if retransmits < self.max_retransmits => {
                Ok(SendOutcome::Retransmit)
            }
            Some(Ack::Negative) => Err(ProtocolError::RetransmitLimit {
                attempts: retransmits + 1,
            }),
            None => Err(ProtocolError::UnexpectedAckByte(byte)),
        }
    }

    /// Decides how to answer a received frame. `rejected` counts the frames
    /// already NACKed while waiting for this packet.
    pub fn after_receive(
        &self,
        decoded: &Result<Vec<u8>, PacketError>,
        rejected: usize,
    ) -> ReceiveAction {
        match (self.mode, decoded) {
            (AckMode::Required, Ok(_)) => ReceiveAction::Accept(Some(Ack::Positive)),
            (AckMode::Required, Err(_)) if rejected < self.max_retransmits => {
                ReceiveAction::Reject
            }
            (AckMode::Disabled, Ok(_)) => ReceiveAction::Accept(None),
            (_, Err(_)) => ReceiveAction::Fail,
        }
    }
}
