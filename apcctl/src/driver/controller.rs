//! Command facade: one locked, logged-in session per outlet command.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};

use super::action::PowerAction;
use super::dialect::FirmwareVersion;
use super::interactive::{self, PassthroughEnd};
use super::navigator::{Navigator, Pacing};
use super::notify::{Notification, Notifier};
use super::outlet::OutletAddress;
use crate::channel::TerminalSession;
use crate::error::Result;
use crate::lock::{LockConfig, LockGuard, SessionLock};
use crate::transport::{Connector, Endpoint, NetConnector, Transport};

/// Controls the outlets of one PDU.
///
/// Every command runs the whole sequence: take the session lock, connect,
/// log in, act, log out, release the lock. The lock is released however
/// the command ends.
///
/// Build with [`ControllerBuilder`](super::ControllerBuilder).
pub struct PduController<C: Connector = NetConnector> {
    endpoint: Endpoint,
    connector: C,
    lock: LockConfig,
    timeout: Duration,
    pacing: Pacing,
    notifier: Arc<dyn Notifier>,
}

impl<C: Connector> PduController<C> {
    pub(super) fn new(
        endpoint: Endpoint,
        connector: C,
        lock: LockConfig,
        timeout: Duration,
        pacing: Pacing,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            endpoint,
            connector,
            lock,
            timeout,
            pacing,
            notifier,
        }
    }

    /// The PDU this controller talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Session lock settings.
    pub fn lock_config(&self) -> &LockConfig {
        &self.lock
    }

    /// Bound on each wait for device output.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The connector sessions are opened with.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Power-cycle an outlet.
    pub async fn reboot(&self, outlet: &str) -> Result<Notification> {
        self.run(PowerAction::Reboot, outlet).await
    }

    /// Switch an outlet on.
    pub async fn turn_on(&self, outlet: &str) -> Result<Notification> {
        self.run(PowerAction::On, outlet).await
    }

    /// Switch an outlet off.
    pub async fn turn_off(&self, outlet: &str) -> Result<Notification> {
        self.run(PowerAction::Off, outlet).await
    }

    /// Run `action` against the outlet named by `token`.
    ///
    /// The token is validated before the lock is taken or the device is
    /// contacted.
    pub async fn run(&self, action: PowerAction, token: &str) -> Result<Notification> {
        let outlet = OutletAddress::resolve(token)?;

        let mut lock = SessionLock::acquire(&self.lock).await?;
        let result = self.run_locked(action, outlet).await;
        lock.release();
        result
    }

    async fn run_locked(&self, action: PowerAction, outlet: OutletAddress) -> Result<Notification> {
        let mut navigator = self.open().await?;
        let result = self.login_and_execute(&mut navigator, action, outlet).await;
        navigator.logout().await;
        result
    }

    async fn login_and_execute(
        &self,
        navigator: &mut Navigator<C::Transport>,
        action: PowerAction,
        outlet: OutletAddress,
    ) -> Result<Notification> {
        navigator
            .login(&self.endpoint.username, &self.endpoint.password)
            .await?;
        navigator.execute(action, outlet).await
    }

    async fn open(&self) -> Result<Navigator<C::Transport>> {
        info!(
            "connecting to {} via {}",
            self.endpoint.socket_addr(),
            self.endpoint.transport
        );
        let session = TerminalSession::open(&self.connector, &self.endpoint, self.timeout).await?;
        Ok(
            Navigator::new(session, self.endpoint.host.clone(), self.notifier.clone())
                .with_pacing(self.pacing),
        )
    }

    /// Take the lock, log in and hand the session over for interactive use.
    ///
    /// The lock is held until the returned session is closed or dropped.
    pub async fn interactive_debug(&self) -> Result<DebugSession<C::Transport>> {
        let lock = SessionLock::acquire(&self.lock).await?;
        let mut navigator = self.open().await?;

        if let Err(e) = navigator
            .login(&self.endpoint.username, &self.endpoint.password)
            .await
        {
            navigator.logout().await;
            return Err(e);
        }

        Ok(DebugSession { navigator, lock })
    }
}

/// A logged-in session under manual control.
pub struct DebugSession<T: Transport> {
    navigator: Navigator<T>,
    lock: LockGuard,
}

impl<T: Transport> DebugSession<T> {
    /// Firmware version detected at login.
    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.navigator.firmware()
    }

    /// The underlying terminal session.
    pub fn session_mut(&mut self) -> &mut TerminalSession<T> {
        self.navigator.session_mut()
    }

    /// Whether the session lock is still held.
    pub fn holds_lock(&self) -> bool {
        self.lock.is_held()
    }

    /// Relay `input` lines to the device and device output to `output`.
    pub async fn passthrough<R, W>(&mut self, input: R, output: &mut W) -> Result<PassthroughEnd>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        interactive::passthrough(self.navigator.session_mut(), input, output).await
    }

    /// Log out and release the lock.
    pub async fn close(mut self) {
        self.navigator.logout().await;
        self.lock.release();
        debug!("debug session closed");
    }
}
