//! Telnet transport over a plain TCP stream.
//!
//! APC management cards speak a very small subset of telnet: the server
//! offers to echo and to suppress go-ahead, and may ask the client about
//! terminal options. We accept the former, refuse everything else, and
//! hand the remaining byte stream to the channel layer.

use bytes::{Buf, BufMut, BytesMut};
use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use super::config::Endpoint;
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SUPPRESS_GO_AHEAD: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Incremental telnet stream decoder.
///
/// Splits the incoming stream into application data and negotiation
/// replies. State carries across calls, so a command split over two TCP
/// reads is handled.
#[derive(Debug)]
pub struct TelnetCodec {
    state: DecodeState,
    accepted: [bool; 256],
    refused: [bool; 256],
}

impl TelnetCodec {
    /// Create a decoder in the data state.
    pub fn new() -> Self {
        Self {
            state: DecodeState::Data,
            accepted: [false; 256],
            refused: [false; 256],
        }
    }

    /// Decode `input`, appending payload to `data` and any negotiation
    /// answers to `replies`.
    pub fn decode(&mut self, mut input: &[u8], data: &mut BytesMut, replies: &mut BytesMut) {
        while !input.is_empty() {
            if self.state == DecodeState::Data {
                match memchr::memchr(IAC, input) {
                    Some(pos) => {
                        data.extend_from_slice(&input[..pos]);
                        self.state = DecodeState::Iac;
                        input = &input[pos + 1..];
                    }
                    None => {
                        data.extend_from_slice(input);
                        return;
                    }
                }
                continue;
            }

            let byte = input[0];
            input = &input[1..];

            self.state = match self.state {
                DecodeState::Data => DecodeState::Data,
                DecodeState::Iac => match byte {
                    IAC => {
                        data.put_u8(IAC);
                        DecodeState::Data
                    }
                    WILL | WONT | DO | DONT => DecodeState::Negotiate(byte),
                    SB => DecodeState::Sub,
                    // NOP, GA, data mark and friends carry no payload
                    _ => DecodeState::Data,
                },
                DecodeState::Negotiate(command) => {
                    self.answer(command, byte, replies);
                    DecodeState::Data
                }
                DecodeState::Sub => match byte {
                    IAC => DecodeState::SubIac,
                    _ => DecodeState::Sub,
                },
                DecodeState::SubIac => match byte {
                    SE => DecodeState::Data,
                    _ => DecodeState::Sub,
                },
            };
        }
    }

    fn answer(&mut self, command: u8, option: u8, replies: &mut BytesMut) {
        let idx = option as usize;
        match command {
            WILL if matches!(option, OPT_ECHO | OPT_SUPPRESS_GO_AHEAD) => {
                if !self.accepted[idx] {
                    self.accepted[idx] = true;
                    replies.extend_from_slice(&[IAC, DO, option]);
                }
            }
            WILL => {
                if !self.refused[idx] {
                    self.refused[idx] = true;
                    replies.extend_from_slice(&[IAC, DONT, option]);
                }
            }
            DO => {
                if !self.refused[idx] {
                    self.refused[idx] = true;
                    replies.extend_from_slice(&[IAC, WONT, option]);
                }
            }
            // WONT / DONT only confirm what we already have
            _ => {}
        }
        trace!("telnet negotiation: cmd={} opt={}", command, option);
    }
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape IAC bytes in outgoing data.
pub fn escape_iac(data: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(data.len() + 2);
    for &b in data {
        if b == IAC {
            out.put_u8(IAC);
        }
        out.put_u8(b);
    }
    out
}

/// Telnet session to the PDU.
///
/// Decoded data and unsent negotiation replies live on the transport, not
/// in a `read_chunk` call, so a read dropped at any await loses nothing.
pub struct TelnetTransport {
    stream: Option<TcpStream>,
    codec: TelnetCodec,
    read_buf: Vec<u8>,
    decoded: BytesMut,
    replies: BytesMut,
}

impl TelnetTransport {
    /// Connect to the endpoint's telnet port.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let port = endpoint.port();
        debug!("telnet connect to {}", endpoint.socket_addr());

        let stream = tokio::time::timeout(
            endpoint.connect_timeout,
            TcpStream::connect((endpoint.host.as_str(), port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(endpoint.connect_timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: endpoint.host.clone(),
            port,
            source,
        })?;

        stream.set_nodelay(true).map_err(TransportError::Io)?;

        Ok(Self {
            stream: Some(stream),
            codec: TelnetCodec::new(),
            read_buf: vec![0; 4096],
            decoded: BytesMut::new(),
            replies: BytesMut::new(),
        })
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::Disconnected.into())
    }

    /// Send queued negotiation replies. Progress is recorded after every
    /// partial write.
    async fn flush_replies(&mut self) -> Result<()> {
        while !self.replies.is_empty() {
            let stream = self.stream.as_mut().ok_or(TransportError::Disconnected)?;
            let n = stream
                .write(&self.replies)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                return Err(TransportError::Disconnected.into());
            }
            self.replies.advance(n);
        }
        Ok(())
    }
}

impl Transport for TelnetTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.flush_replies().await?;
        let escaped = escape_iac(data);
        let stream = self.stream()?;
        stream.write_all(&escaped).await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            self.flush_replies().await?;
            if !self.decoded.is_empty() {
                return Ok(Some(self.decoded.split().to_vec()));
            }

            let stream = self.stream.as_mut().ok_or(TransportError::Disconnected)?;
            let n = stream
                .read(&mut self.read_buf)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                return Ok(None);
            }
            self.codec
                .decode(&self.read_buf[..n], &mut self.decoded, &mut self.replies);
        }
    }

    async fn send_eof(&mut self) -> Result<()> {
        let stream = self.stream()?;
        stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            // The peer may already have hung up after logout
            if let Err(e) = stream.shutdown().await {
                trace!("telnet shutdown on close: {}", e);
            }
        }
        Ok(())
    }
}
