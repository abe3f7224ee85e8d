//! Scripted in-memory transport for protocol tests.
//!
//! Plays the device side of a conversation: output queued with `emit` is
//! readable immediately, output queued with `on` becomes readable once the
//! driver writes the matching input. Every write is logged so tests can
//! assert the exact keystroke stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Connector, Endpoint, Transport};
use crate::error::{Result, TransportError};

pub(crate) const EOF_MARK: &str = "<EOF>";
pub(crate) const CLOSE_MARK: &str = "<CLOSE>";

pub(crate) struct ScriptedTransport {
    ready: VecDeque<Vec<u8>>,
    replies: VecDeque<(String, String)>,
    log: Arc<Mutex<Vec<String>>>,
    hangup_when_done: bool,
    pre_authenticated: bool,
    closed: bool,
}

/// Shared view of what the driver wrote.
#[derive(Clone)]
pub(crate) struct WriteLog(Arc<Mutex<Vec<String>>>);

impl WriteLog {
    /// Every write, in order, lossily decoded.
    pub(crate) fn writes(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Writes with the trailing line terminator removed, control markers
    /// and escape keys dropped: the keystrokes as a human would list them.
    pub(crate) fn keystrokes(&self) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|w| w != EOF_MARK && w != CLOSE_MARK && w != "\x1b")
            .map(|w| w.strip_suffix("\r\n").unwrap_or(&w).to_string())
            .collect()
    }

    /// Number of escape keys written.
    pub(crate) fn escapes(&self) -> usize {
        self.writes().iter().filter(|w| *w == "\x1b").count()
    }
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            replies: VecDeque::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            hangup_when_done: false,
            pre_authenticated: false,
            closed: false,
        }
    }

    /// Output available before any input.
    pub(crate) fn emit(mut self, output: &str) -> Self {
        if self.replies.is_empty() {
            self.ready.push_back(output.as_bytes().to_vec());
        } else if let Some(last) = self.replies.back_mut() {
            last.1.push_str(output);
        }
        self
    }

    /// Output released once `input` (including its line terminator) has
    /// been written.
    pub(crate) fn on(mut self, input: &str, output: &str) -> Self {
        self.replies.push_back((input.to_string(), output.to_string()));
        self
    }

    /// Report the peer as closed once the script is exhausted instead of
    /// stalling.
    pub(crate) fn hangup_when_done(mut self) -> Self {
        self.hangup_when_done = true;
        self
    }

    pub(crate) fn pre_authenticated(mut self) -> Self {
        self.pre_authenticated = true;
        self
    }

    pub(crate) fn log(&self) -> WriteLog {
        WriteLog(self.log.clone())
    }

    fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }
}

impl Transport for ScriptedTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Disconnected.into());
        }
        let text = String::from_utf8_lossy(data).to_string();
        if self.replies.front().is_some_and(|(input, _)| *input == text) {
            if let Some((_, output)) = self.replies.pop_front() {
                self.ready.push_back(output.into_bytes());
            }
        }
        self.record(text);
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(TransportError::Disconnected.into());
        }
        if let Some(chunk) = self.ready.pop_front() {
            return Ok(Some(chunk));
        }
        if self.hangup_when_done && self.replies.is_empty() {
            return Ok(None);
        }
        std::future::pending().await
    }

    async fn send_eof(&mut self) -> Result<()> {
        self.record(EOF_MARK);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.record(CLOSE_MARK);
        }
        Ok(())
    }

    fn pre_authenticated(&self) -> bool {
        self.pre_authenticated
    }
}

/// Connector handing out one scripted transport.
pub(crate) struct ScriptedConnector {
    transport: Mutex<Option<ScriptedTransport>>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub(crate) fn new(transport: ScriptedTransport) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            connects: AtomicUsize::new(0),
        }
    }

    /// Connector whose every attempt fails like an unreachable host.
    pub(crate) fn unreachable() -> Self {
        Self {
            transport: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, endpoint: &Endpoint) -> Result<ScriptedTransport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let transport = self.transport.lock().unwrap().take();
        transport.ok_or_else(|| {
            TransportError::ConnectionFailed {
                host: endpoint.host.clone(),
                port: endpoint.port(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }
            .into()
        })
    }
}
