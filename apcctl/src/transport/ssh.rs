//! SSH transport implementation using russh.
//!
//! Newer APC firmware serves the same menu over SSH. The SSH layer handles
//! authentication, so the menu never shows its own login prompts.

use std::sync::Arc;

use log::{debug, trace};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::Transport;
use super::config::Endpoint;
use crate::error::{Result, TransportError};

/// SSH session carrying one interactive menu channel.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// The PTY shell channel (None once closed).
    channel: Option<Channel<Msg>>,
}

impl SshTransport {
    /// Connect to the SSH server, authenticate and open the menu shell.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let config = Arc::new(client::Config::default());
        let port = endpoint.port();
        debug!("ssh connect to {}", endpoint.socket_addr());

        let mut session = tokio::time::timeout(
            endpoint.connect_timeout,
            client::connect(config, (endpoint.host.as_str(), port), SshHandler),
        )
        .await
        .map_err(|_| TransportError::Timeout(endpoint.connect_timeout))?
        .map_err(|e| match e {
            russh::Error::IO(source) => TransportError::ConnectionFailed {
                host: endpoint.host.clone(),
                port,
                source,
            },
            other => TransportError::Ssh(other),
        })?;

        let authenticated = session
            .authenticate_password(&endpoint.username, endpoint.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?
            .success();

        if !authenticated {
            return Err(TransportError::AuthenticationFailed {
                user: endpoint.username.clone(),
            }
            .into());
        }

        let channel = Self::open_channel(&session).await?;

        Ok(Self {
            session,
            channel: Some(channel),
        })
    }

    /// Open a PTY shell channel on this connection.
    async fn open_channel(session: &Handle<SshHandler>) -> Result<Channel<Msg>> {
        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(true, "vt100", 80, 24, 0, 0, &[])
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    fn channel(&mut self) -> Result<&mut Channel<Msg>> {
        self.channel
            .as_mut()
            .ok_or_else(|| TransportError::Disconnected.into())
    }
}

impl Transport for SshTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let channel = self.channel()?;
        channel.data(data).await.map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let channel = self.channel()?;
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::ExtendedData { data, .. }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(other) => trace!("ssh channel message ignored: {:?}", other),
            }
        }
    }

    async fn send_eof(&mut self) -> Result<()> {
        let channel = self.channel()?;
        channel.eof().await.map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                trace!("ssh channel close: {}", e);
            }
            self.session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
                .map_err(TransportError::Ssh)?;
        }
        Ok(())
    }

    fn pre_authenticated(&self) -> bool {
        true
    }
}

/// SSH client handler for russh.
///
/// PDUs are lab equipment without known_hosts entries, so every host key is
/// accepted.
struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
