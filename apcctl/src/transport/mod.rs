//! Transport layer: the byte stream under the PDU menu session.
//!
//! A [`Transport`] moves raw bytes to and from the device; a [`Connector`]
//! creates one for an [`Endpoint`]. Telnet is the default because every APC
//! firmware revision serves its menu there; SSH is available for firmware
//! that supports it.

pub mod config;
#[cfg(test)]
pub(crate) mod mock;
mod ssh;
mod telnet;

pub use config::{DEFAULT_PASSWORD, DEFAULT_USERNAME, Endpoint, TransportKind};
pub use ssh::SshTransport;
pub use telnet::{TelnetCodec, TelnetTransport};

use std::future::Future;

use crate::error::Result;

/// Byte stream to a remote login session.
pub trait Transport: Send {
    /// Write raw bytes to the session.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next chunk of output. `None` means the peer closed.
    fn read_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Signal end of input to the peer.
    fn send_eof(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Tear the session down. Calling this more than once is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the transport already authenticated the user, so the menu
    /// will not ask for a username and password.
    fn pre_authenticated(&self) -> bool {
        false
    }
}

/// Factory for transports.
pub trait Connector: Send + Sync {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Establish a session with `endpoint`.
    fn connect(&self, endpoint: &Endpoint)
    -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Connector that dials the endpoint's configured [`TransportKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NetConnector;

impl Connector for NetConnector {
    type Transport = AnyTransport;

    async fn connect(&self, endpoint: &Endpoint) -> Result<AnyTransport> {
        match endpoint.transport {
            TransportKind::Telnet => TelnetTransport::connect(endpoint)
                .await
                .map(AnyTransport::Telnet),
            TransportKind::Ssh => SshTransport::connect(endpoint).await.map(AnyTransport::Ssh),
        }
    }
}

/// Either of the built-in transports.
pub enum AnyTransport {
    Telnet(TelnetTransport),
    Ssh(SshTransport),
}

impl Transport for AnyTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        match self {
            AnyTransport::Telnet(t) => t.write(data).await,
            AnyTransport::Ssh(t) => t.write(data).await,
        }
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self {
            AnyTransport::Telnet(t) => t.read_chunk().await,
            AnyTransport::Ssh(t) => t.read_chunk().await,
        }
    }

    async fn send_eof(&mut self) -> Result<()> {
        match self {
            AnyTransport::Telnet(t) => t.send_eof().await,
            AnyTransport::Ssh(t) => t.send_eof().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            AnyTransport::Telnet(t) => t.close().await,
            AnyTransport::Ssh(t) => t.close().await,
        }
    }

    fn pre_authenticated(&self) -> bool {
        match self {
            AnyTransport::Telnet(t) => t.pre_authenticated(),
            AnyTransport::Ssh(t) => t.pre_authenticated(),
        }
    }
}
