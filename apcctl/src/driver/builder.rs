//! Builder for PDU controllers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use super::controller::PduController;
use super::navigator::Pacing;
use super::notify::{LogNotifier, Notifier};
use crate::channel::DEFAULT_EXPECT_TIMEOUT;
use crate::error::{DriverError, Error, Result};
use crate::lock::LockConfig;
use crate::transport::{Connector, Endpoint, NetConnector, TransportKind};

/// Builder for constructing a [`PduController`].
///
/// # Example
///
/// ```rust,no_run
/// use apcctl::driver::ControllerBuilder;
///
/// # async fn example() -> Result<(), apcctl::Error> {
/// let pdu = ControllerBuilder::new("10.0.0.5")
///     .username("apc")
///     .password("apc")
///     .build()?;
///
/// pdu.reboot("3").await?;
/// # Ok(())
/// # }
/// ```
pub struct ControllerBuilder {
    endpoint: Endpoint,
    lock: LockConfig,
    timeout: Duration,
    pacing: Pacing,
    notifier: Arc<dyn Notifier>,
}

impl ControllerBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(host),
            lock: LockConfig::default(),
            timeout: DEFAULT_EXPECT_TIMEOUT,
            pacing: Pacing::default(),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Set the port (default: the transport's standard port).
    pub fn port(mut self, port: u16) -> Self {
        self.endpoint.port = Some(port);
        self
    }

    /// Set the menu username (default: `apc`).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.endpoint.username = username.into();
        self
    }

    /// Set the menu password (default: `apc`).
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.endpoint.password = SecretString::from(password.into());
        self
    }

    /// Set the transport protocol (default: telnet).
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.endpoint.transport = transport;
        self
    }

    /// Set the bound on each wait for device output.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bound on establishing the connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint.connect_timeout = timeout;
        self
    }

    /// Replace the session lock settings.
    pub fn lock_config(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Set the lock file path.
    pub fn lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock.path = path.into();
        self
    }

    /// Set how many times to try for the lock.
    pub fn lock_attempts(mut self, attempts: u32) -> Self {
        self.lock.attempts = attempts;
        self
    }

    /// Set keystroke pacing inside menu walks.
    pub fn pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set where completed-command notifications go (default: the log).
    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Build a controller that dials the network.
    ///
    /// Nothing is contacted until a command runs.
    pub fn build(self) -> Result<PduController<NetConnector>> {
        self.build_with_connector(NetConnector)
    }

    /// Build a controller that opens sessions through `connector`.
    pub fn build_with_connector<C: Connector>(self, connector: C) -> Result<PduController<C>> {
        if self.endpoint.host.trim().is_empty() {
            return Err(invalid("host is required"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout must be greater than zero"));
        }
        if self.endpoint.connect_timeout.is_zero() {
            return Err(invalid("connect timeout must be greater than zero"));
        }
        if self.lock.attempts == 0 {
            return Err(invalid("lock attempts must be at least 1"));
        }

        Ok(PduController::new(
            self.endpoint,
            connector,
            self.lock,
            self.timeout,
            self.pacing,
            self.notifier,
        ))
    }
}

fn invalid(message: &str) -> Error {
    DriverError::InvalidConfig {
        message: message.to_string(),
    }
    .into()
}
