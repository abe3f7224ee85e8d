//! Terminal session: line-oriented send and pattern-based wait over a
//! [`Transport`].

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::{ChannelError, Result};
use crate::transport::{Connector, Endpoint, Transport};

/// Default bound on every `expect` call.
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Line terminator the APC menu expects after each entry.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Outcome of a successful `expect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    /// Output received before the match.
    pub before: String,

    /// The text that matched.
    pub matched: String,
}

/// Interactive session with the device.
///
/// Owns the transport for its whole lifetime; `close` tears it down.
pub struct TerminalSession<T: Transport> {
    transport: T,
    buffer: PatternBuffer,
    timeout: Duration,
    closed: bool,
}

impl<T: Transport> TerminalSession<T> {
    /// Wrap an established transport.
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(),
            timeout,
            closed: false,
        }
    }

    /// Connect to `endpoint` and wrap the resulting transport.
    pub async fn open<C>(connector: &C, endpoint: &Endpoint, timeout: Duration) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        let transport = connector.connect(endpoint).await?;
        debug!("session open to {}", endpoint.socket_addr());
        Ok(Self::new(transport, timeout))
    }

    /// Get the default expect timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the default expect timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the transport already authenticated the user.
    pub fn pre_authenticated(&self) -> bool {
        self.transport.pre_authenticated()
    }

    /// Send `text` followed by the line terminator.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        trace!("send {:?}", text);
        self.write_line(text).await
    }

    /// Send `text` followed by the line terminator without logging it.
    pub async fn send_hidden(&mut self, text: &str) -> Result<()> {
        trace!("send <hidden>");
        self.write_line(text).await
    }

    /// Send bytes exactly as given.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        trace!("send raw {:?}", String::from_utf8_lossy(data));
        self.transport.write(data).await
    }

    async fn write_line(&mut self, text: &str) -> Result<()> {
        let mut line = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        line.push_str(text);
        line.push_str(LINE_TERMINATOR);
        self.transport.write(line.as_bytes()).await
    }

    /// Wait for `pattern` with the default timeout.
    pub async fn expect(&mut self, pattern: &Regex) -> Result<Expected> {
        self.expect_with_timeout(pattern, self.timeout).await
    }

    /// Wait for the literal `text` with the default timeout.
    pub async fn expect_literal(&mut self, text: &str) -> Result<Expected> {
        let pattern = Regex::new(&regex::escape(text)).map_err(ChannelError::InvalidPattern)?;
        self.wait_for(&pattern, text, self.timeout).await
    }

    /// Wait for `pattern`, failing after `timeout`.
    ///
    /// Output up to the end of the match is consumed; anything after it
    /// stays buffered for the next wait.
    pub async fn expect_with_timeout(
        &mut self,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<Expected> {
        self.wait_for(pattern, pattern.as_str(), timeout).await
    }

    async fn wait_for(
        &mut self,
        pattern: &Regex,
        label: &str,
        timeout: Duration,
    ) -> Result<Expected> {
        let deadline = Instant::now() + timeout;
        trace!("expect {:?} within {:?}", label, timeout);

        loop {
            if let Some((start, end)) = self.buffer.find(pattern) {
                let consumed = self.buffer.consume(end);
                let expected = Expected {
                    before: String::from_utf8_lossy(&consumed[..start]).into_owned(),
                    matched: String::from_utf8_lossy(&consumed[start..]).into_owned(),
                };
                trace!("matched {:?}", expected.matched);
                return Ok(expected);
            }

            match tokio::time::timeout_at(deadline, self.transport.read_chunk()).await {
                Ok(Ok(Some(chunk))) => self.buffer.extend(&chunk),
                Ok(Ok(None)) => return Err(ChannelError::Closed.into()),
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    if self.buffer.is_empty() {
                        debug!("timed out waiting for {:?}, no output", label);
                    } else {
                        debug!(
                            "timed out waiting for {:?}, pending output: {:?}",
                            label,
                            self.buffer.as_str_lossy()
                        );
                    }
                    return Err(ChannelError::PatternTimeout {
                        pattern: label.to_string(),
                        timeout,
                    }
                    .into());
                }
            }
        }
    }

    /// Drain buffered output plus whatever the transport has ready, without
    /// waiting for more.
    pub async fn read_all(&mut self) -> Result<String> {
        loop {
            match tokio::time::timeout(Duration::ZERO, self.transport.read_chunk()).await {
                Ok(Ok(Some(chunk))) => self.buffer.extend(&chunk),
                Ok(Ok(None)) | Err(_) => break,
                Ok(Err(e)) => return Err(e),
            }
        }
        Ok(String::from_utf8_lossy(&self.buffer.take()).into_owned())
    }

    /// Signal end of input to the device.
    pub async fn send_eof(&mut self) -> Result<()> {
        trace!("send eof");
        self.transport.send_eof().await
    }

    /// Close the session. Calling this more than once is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close().await
    }

    /// Raw access to the transport, for interactive pass-through.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::mock::{CLOSE_MARK, ScriptedTransport};

    fn session(transport: ScriptedTransport) -> TerminalSession<ScriptedTransport> {
        TerminalSession::new(transport, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_send_appends_line_terminator() {
        let transport = ScriptedTransport::new();
        let log = transport.log();
        let mut session = session(transport);

        session.send("1").await.unwrap();
        session.send("").await.unwrap();
        session.send_raw(b"\x1b").await.unwrap();

        assert_eq!(log.writes(), vec!["1\r\n", "\r\n", "\x1b"]);
    }

    #[tokio::test]
    async fn test_expect_returns_preceding_output() {
        let transport = ScriptedTransport::new()
            .emit("APC Web/SNMP Management Card\r\n")
            .emit(" v3.5.8 \r\nCommunication Established\r\n> ");
        let mut session = session(transport);

        let expected = session
            .expect_literal("Communication Established")
            .await
            .unwrap();
        assert_eq!(expected.matched, "Communication Established");
        assert_eq!(
            expected.before,
            "APC Web/SNMP Management Card\r\n v3.5.8 \r\n"
        );

        // Remainder stays buffered
        assert_eq!(session.read_all().await.unwrap(), "\r\n> ");
    }

    #[tokio::test]
    async fn test_expect_waits_for_reply_to_input() {
        let transport = ScriptedTransport::new()
            .emit("User Name : ")
            .on("apc\r\n", "Password  : ");
        let mut session = session(transport);

        session.expect_literal("User Name : ").await.unwrap();
        session.send("apc").await.unwrap();
        session.expect_literal("Password  : ").await.unwrap();
    }

    #[tokio::test]
    async fn test_expect_timeout_names_pattern() {
        let transport = ScriptedTransport::new().emit("nothing useful");
        let mut session = session(transport);

        let err = session.expect_literal("Outlet State").await.unwrap_err();
        match err {
            Error::Channel(ChannelError::PatternTimeout { pattern, timeout }) => {
                assert_eq!(pattern, "Outlet State");
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected pattern timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expect_regex_pattern() {
        let transport = ScriptedTransport::new().emit("\r\n Outlet 3 State: ON \r\n> ");
        let mut session = session(transport);

        let pattern = Regex::new(r"State: (ON|OFF)").unwrap();
        let expected = session.expect(&pattern).await.unwrap();
        assert_eq!(expected.before, "\r\n Outlet 3 ");
        assert_eq!(expected.matched, "State: ON");
    }

    #[tokio::test]
    async fn test_timeout_overrides() {
        let transport = ScriptedTransport::new().emit("> ");
        let mut session = session(transport);
        let pattern = Regex::new(r"Immediate (On|Off)").unwrap();

        session.set_timeout(Duration::from_millis(20));
        assert_eq!(session.timeout(), Duration::from_millis(20));

        match session.expect(&pattern).await.unwrap_err() {
            Error::Channel(ChannelError::PatternTimeout { pattern, timeout }) => {
                assert_eq!(pattern, r"Immediate (On|Off)");
                assert_eq!(timeout, Duration::from_millis(20));
            }
            other => panic!("expected pattern timeout, got {other:?}"),
        }

        let err = session
            .expect_with_timeout(&pattern, Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Channel(ChannelError::PatternTimeout { timeout, .. })
                if timeout == Duration::from_millis(5)
        ));
        // Unmatched output is kept for the next wait
        assert_eq!(session.read_all().await.unwrap(), "> ");
    }

    #[tokio::test]
    async fn test_expect_on_closed_peer() {
        let transport = ScriptedTransport::new().emit("bye").hangup_when_done();
        let mut session = session(transport);

        let err = session.expect_literal("menu").await.unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_read_all_does_not_block() {
        let transport = ScriptedTransport::new();
        let mut session = session(transport);
        assert_eq!(session.read_all().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = ScriptedTransport::new();
        let log = transport.log();
        let mut session = session(transport);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(session.is_closed());
        assert_eq!(log.writes(), vec![CLOSE_MARK]);
    }
}
