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

//! In-memory stand-ins for a stub, used by the unit tests.

use core::pin::Pin;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use futures::io::{AsyncRead, AsyncWrite};
use futures::task::{Context, Poll};

use crate::transport::Transport;

#[derive(Default)]
struct MockState {
    read_data: VecDeque<u8>,
    /// Replies not yet readable, each released by the next packet written.
    script: VecDeque<Vec<u8>>,
    write_data: Vec<u8>,
    writes_stalled: bool,
    incoming_closed: bool,
    closed: bool,
}

/// Mock stream handing out one byte per read, so tests can tell exactly how
/// much the client consumed. Reads stay pending once the readable data runs
/// out, like a stub that has nothing more to say.
///
/// Like a real stub, the mock only answers once it was sent something:
/// scripted replies become readable one at a time, each when the client
/// writes a packet or an interrupt.
#[derive(Clone, Default)]
pub struct MockStream {
    state: Arc<Mutex<MockState>>,
}

impl MockStream {
    /// A stream answering the first packet written with `reply`.
    pub fn new(reply: &[u8]) -> Self {
        Self::replying(&[reply])
    }

    /// A stream answering the n-th packet written with `replies[n]`.
    pub fn replying(replies: &[&[u8]]) -> Self {
        let stream = Self::default();
        for reply in replies {
            stream.script_reply(reply);
        }
        stream
    }

    /// Queues `bytes` to become readable after the next packet written.
    pub fn script_reply(&self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.state.lock().unwrap().script.push_back(bytes.to_vec());
        }
    }

    /// Makes `bytes` readable right away, as if sent unprompted.
    pub fn push_incoming(&self, bytes: &[u8]) {
        self.state.lock().unwrap().read_data.extend(bytes);
    }

    /// Makes reads return end-of-stream once all data, scripted replies
    /// included, is consumed.
    pub fn close_incoming(&self) {
        self.state.lock().unwrap().incoming_closed = true;
    }

    /// While stalled, writes stay pending and nothing is written.
    pub fn stall_writes(&self, stalled: bool) {
        self.state.lock().unwrap().writes_stalled = stalled;
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().write_data.clone()
    }

    pub fn unread(&self) -> Vec<u8> {
        self.state.lock().unwrap().read_data.iter().copied().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock().unwrap();
        match state.read_data.pop_front() {
            Some(byte) if !buf.is_empty() => {
                buf[0] = byte;
                Poll::Ready(Ok(1))
            }
            Some(byte) => {
                state.read_data.push_front(byte);
                Poll::Ready(Ok(0))
            }
            None if state.incoming_closed && state.script.is_empty() => Poll::Ready(Ok(0)),
            None => Poll::Pending,
        }
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock().unwrap();
        if state.writes_stalled {
            return Poll::Pending;
        }
        state.write_data.extend_from_slice(buf);
        if matches!(buf.first().copied(), Some(b'$' | 0x03)) {
            if let Some(reply) = state.script.pop_front() {
                state.read_data.extend(reply);
            }
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.state.lock().unwrap().closed = true;
        Poll::Ready(Ok(()))
    }
}

/// Hands out clones of one [`MockStream`], or refuses to connect.
pub struct MockTransport {
    stream: Option<MockStream>,
}

impl MockTransport {
    pub fn new(stream: MockStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn refusing() -> Self {
        Self { stream: None }
    }
}

impl Transport for MockTransport {
    type Stream = MockStream;

    async fn open(&mut self) -> io::Result<MockStream> {
        self.stream
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }
}
