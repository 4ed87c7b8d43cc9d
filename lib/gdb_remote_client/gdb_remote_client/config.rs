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

/// Time to wait for a reply; slow targets such as simulations need a
/// generous default.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);
/// RSP does not mandate a retry count.
pub const DEFAULT_MAX_RETRANSMITS: usize = 3;
pub const DEFAULT_MAX_PACKET_SIZE: usize = 128 * 1024;

/// Tunables of a [`Client`](crate::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Deadline for a command reply or a stop reply.
    pub reply_timeout: Duration,
    /// Deadline for the `+`/`-` following a sent packet.
    pub ack_timeout: Duration,
    /// How often a packet is resent after `-` before giving up. Also bounds
    /// how many corrupted packets in a row are NACKed.
    pub max_retransmits: usize,
    /// Largest frame accepted from the remote.
    pub max_packet_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retransmits: DEFAULT_MAX_RETRANSMITS,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}
