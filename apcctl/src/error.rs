//! Error types for apcctl.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for apcctl operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (connecting, reading, writing)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Menu driver errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Session lock errors
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

/// Transport layer errors (telnet/SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching on the session stream).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern '{pattern}' not found within {timeout:?}")]
    PatternTimeout { pattern: String, timeout: Duration },

    /// Channel closed before the pattern appeared
    #[error("Channel closed")]
    Closed,

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (menu protocol, outlet validation).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Navigator has no open session
    #[error("Driver not connected - call login() first")]
    NotConnected,

    /// The device did not speak the menu protocol we expect
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Outlet token is neither a number nor an all-outlets alias
    #[error("Bad outlet: [{token}]")]
    InvalidOutlet { token: String },

    /// Invalid configuration in the controller builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Session lock errors.
#[derive(Error, Debug)]
pub enum LockError {
    /// Another holder kept the lock for every attempt
    #[error("Cannot acquire {} after {attempts} attempts", path.display())]
    Timeout { path: PathBuf, attempts: u32 },

    /// The lock file could not be opened or locked
    #[error("Lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DriverError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Result type alias using apcctl's Error.
pub type Result<T> = std::result::Result<T, Error>;
