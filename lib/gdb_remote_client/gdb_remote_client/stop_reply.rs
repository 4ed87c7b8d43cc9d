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

use nom::branch::alt;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::{char, one_of};
use nom::combinator::{map, map_res, value};
use nom::sequence::preceded;
use nom::{IResult, Parser};

/// First bytes of the packets that end a running episode.
const STOP_REPLY_PREFIXES: &[u8] = b"TSWXwN";

/// Returns true if `payload` is shaped like a stop reply.
pub fn is_stop_reply(payload: &[u8]) -> bool {
    payload
        .first()
        .is_some_and(|first| STOP_REPLY_PREFIXES.contains(first))
}

/// Why the target stopped.
///
/// Only the leading status is interpreted; the `n:r;` pairs of a `T` reply
/// are left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `S AA` or `T AA…`: the target received signal `AA`.
    Signal(u8),
    /// `W AA`: the process exited with status `AA`.
    Exited(u8),
    /// `X AA`: the process was terminated by signal `AA`.
    Terminated(u8),
    /// `w AA;tid`: a thread exited with status `AA`.
    ThreadExited(u8),
    /// `N`: no resumed threads are left.
    NoResumed,
}

impl StopReason {
    /// Parses the reason out of a stop reply returned by
    /// [`Client::get_stop_reply`](crate::Client::get_stop_reply).
    pub fn parse(reply: &str) -> Option<Self> {
        stop_reason(reply).ok().map(|(_, reason)| reason)
    }
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s: &str| {
        u8::from_str_radix(s, 16)
    })
    .parse(input)
}

fn stop_reason(input: &str) -> IResult<&str, StopReason> {
    alt((
        map(preceded(one_of("ST"), hex_byte), StopReason::Signal),
        map(preceded(char('W'), hex_byte), StopReason::Exited),
        map(preceded(char('X'), hex_byte), StopReason::Terminated),
        map(preceded(char('w'), hex_byte), StopReason::ThreadExited),
        value(StopReason::NoResumed, char('N')),
    ))
    .parse(input)
}
