//! Telnet transport over any async byte stream.
//!
//! Only the slice of RFC 854 that line-mode OLT CLIs exercise is handled:
//! option negotiation is answered (we refuse to do anything ourselves and
//! let the server echo and suppress go-ahead), subnegotiation is skipped,
//! and `IAC IAC` is unescaped back into a literal `0xFF`.

use bytes::{Bytes, BytesMut};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Telnet protocol decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Incremental telnet decoder.
///
/// Feeds raw socket bytes, yields application data plus the negotiation
/// replies that must be written back.
#[derive(Debug, Default)]
pub struct TelnetCodec {
    state: State,
}

impl TelnetCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk. Returns `(data, replies)`.
    pub fn decode(&mut self, input: &[u8]) -> (BytesMut, Vec<u8>) {
        let mut data = BytesMut::with_capacity(input.len());
        let mut replies = Vec::new();

        // Fast path: plain data with no command bytes pending.
        if self.state == State::Data && memchr::memchr(IAC, input).is_none() {
            data.extend(input.iter().copied().filter(|&b| b != 0));
            return (data, replies);
        }

        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, 0) => State::Data,
                (State::Data, b) => {
                    data.extend_from_slice(&[b]);
                    State::Data
                }
                (State::Iac, IAC) => {
                    data.extend_from_slice(&[IAC]);
                    State::Data
                }
                (State::Iac, cmd @ (DO | DONT | WILL | WONT)) => State::Negotiate(cmd),
                (State::Iac, SB) => State::Sub,
                (State::Iac, _) => State::Data,
                (State::Negotiate(cmd), option) => {
                    if let Some(reply) = Self::answer(cmd, option) {
                        trace!("telnet: answering {:?} for option {}", reply, option);
                        replies.extend_from_slice(&[IAC, reply, option]);
                    }
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }

        (data, replies)
    }

    fn answer(cmd: u8, option: u8) -> Option<u8> {
        match cmd {
            DO => Some(WONT),
            WILL if option == OPT_ECHO || option == OPT_SGA => Some(DO),
            WILL => Some(DONT),
            _ => None,
        }
    }
}

/// Escape outgoing bytes (`0xFF` becomes `IAC IAC`).
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == IAC {
            out.push(IAC);
        }
        out.push(b);
    }
    out
}

/// Telnet transport wrapping a stream.
pub struct TelnetTransport<S> {
    stream: S,
    codec: TelnetCodec,
    read_buf: BytesMut,
}

impl<S> TelnetTransport<S> {
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            codec: TelnetCodec::new(),
            read_buf: BytesMut::with_capacity(8192),
        }
    }
}

impl TelnetTransport<TcpStream> {
    /// Open a TCP connection to `host:port`.
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: std::time::Duration,
    ) -> Result<Self, TransportError> {
        debug!("telnet: connecting to {}:{}", host, port);
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|source| TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                source,
            })?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> Transport for TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(&escape(data)).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            self.read_buf.clear();
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(None);
            }

            let (data, replies) = self.codec.decode(&self.read_buf);
            if !replies.is_empty() {
                self.stream.write_all(&replies).await?;
                self.stream.flush().await?;
            }
            if !data.is_empty() {
                return Ok(Some(data.freeze()));
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
