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

//! The byte stream underneath a [`Client`](crate::Client).

use std::future::Future;
use std::io;

use futures::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// Opens the byte stream a client talks over.
///
/// The stream must be reliable and ordered. Reads are bounded by the
/// client's timeouts, and the stream is closed through
/// [`AsyncWriteExt::close`](futures::io::AsyncWriteExt::close) on
/// disconnect.
pub trait Transport {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    fn open(&mut self) -> impl Future<Output = io::Result<Self::Stream>>;
}

/// A GDB server listening on TCP, e.g. `localhost:1234`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Transport for TcpTransport {
    type Stream = Compat<TcpStream>;

    async fn open(&mut self) -> io::Result<Self::Stream> {
        let stream = TcpStream::connect(&self.addr).await?;
        // Packets are small and latency bound.
        stream.set_nodelay(true)?;
        log::debug!("connected to {}", self.addr);
        Ok(stream.compat())
    }
}
