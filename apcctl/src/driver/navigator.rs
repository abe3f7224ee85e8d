//! Menu navigator: the protocol state machine that drives the PDU menu.
//!
//! ```text
//! Disconnected -> Authenticating -> VersionDetected -> AtMainMenu
//!                                                       |      ^
//!                                   ConfiguringOutlet <-+      |
//!                                          |                   |
//!                                   ActionPending -> ActionConfirmed
//!
//! AtMainMenu (or any failed state) -> LoggedOut
//! ```
//!
//! Inside a menu walk keystrokes are sent without waiting for the screen
//! they select: the menu redraws synchronously, so the keys land in order.
//! All walks go through [`Navigator::send_keys`], which applies the
//! configured [`Pacing`].

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use super::action::PowerAction;
use super::dialect::{
    CONFIRM, Dialect, ESCAPE, ESCAPES_TO_MAIN, FirmwareVersion, LOGIN_BANNER_END, LOGOUT,
    REBOOT_PROMPT,
};
use super::notify::{Notification, Notifier};
use super::outlet::OutletAddress;
use crate::channel::TerminalSession;
use crate::error::{DriverError, Result};
use crate::transport::Transport;

/// Menu prompt asking for the username.
pub const USERNAME_PROMPT: &str = "User Name : ";

/// Menu prompt asking for the password.
pub const PASSWORD_PROMPT: &str = "Password  : ";

/// Where the navigator believes the menu is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Disconnected,
    Authenticating,
    VersionDetected,
    AtMainMenu,
    ConfiguringOutlet,
    ActionPending,
    ActionConfirmed,
    LoggedOut,
}

/// How keystrokes inside a menu walk are spaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Send keystrokes back to back.
    #[default]
    Blind,
    /// Pause between keystrokes, for slow management cards.
    Delay(Duration),
}

/// Drives one authenticated menu session.
pub struct Navigator<T: Transport> {
    session: TerminalSession<T>,
    host: String,
    state: NavState,
    firmware: Option<FirmwareVersion>,
    pacing: Pacing,
    notifier: Arc<dyn Notifier>,
}

impl<T: Transport> Navigator<T> {
    /// Wrap an open session to `host`.
    pub fn new(
        session: TerminalSession<T>,
        host: impl Into<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            host: host.into(),
            state: NavState::Disconnected,
            firmware: None,
            pacing: Pacing::default(),
            notifier,
        }
    }

    /// Set keystroke pacing.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Current protocol state.
    pub fn state(&self) -> NavState {
        self.state
    }

    /// Firmware version, once logged in.
    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    /// Menu dialect, once logged in.
    pub fn dialect(&self) -> Option<Dialect> {
        self.firmware.map(|v| v.dialect())
    }

    /// Host this navigator talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The underlying session.
    pub fn session_mut(&mut self) -> &mut TerminalSession<T> {
        &mut self.session
    }

    /// Log in and detect the firmware version.
    ///
    /// Fails with a protocol error if the banner carries no version: the
    /// keystroke tables differ per version, so navigation cannot proceed.
    pub async fn login(
        &mut self,
        username: &str,
        password: &SecretString,
    ) -> Result<FirmwareVersion> {
        self.state = NavState::Authenticating;

        if !self.session.pre_authenticated() {
            self.wait_for(USERNAME_PROMPT).await?;
            self.session.send(username).await?;
            self.wait_for(PASSWORD_PROMPT).await?;
            self.session.send_hidden(password.expose_secret()).await?;
        }

        let banner = self.wait_for(LOGIN_BANNER_END).await?;
        let firmware = FirmwareVersion::from_banner(&banner).ok_or_else(|| {
            warn!("no firmware version in banner from {}", self.host);
            DriverError::protocol("version unparsable")
        })?;

        self.firmware = Some(firmware);
        self.state = NavState::VersionDetected;
        info!(
            "Logged in as user {}, version {} ({} menu)",
            username,
            firmware,
            firmware.dialect()
        );

        self.state = NavState::AtMainMenu;
        Ok(firmware)
    }

    /// Run `action` against `outlet` and return to the main menu.
    ///
    /// A missing completion signal is reported as a pattern timeout; the
    /// command is never retried.
    pub async fn execute(
        &mut self,
        action: PowerAction,
        outlet: OutletAddress,
    ) -> Result<Notification> {
        let dialect = self.dialect().ok_or(DriverError::NotConnected)?;
        if self.state != NavState::AtMainMenu {
            return Err(DriverError::protocol(format!(
                "cannot start {action} from menu state {:?}",
                self.state
            ))
            .into());
        }
        let table = dialect.table();
        debug!("{} {} using {} menu", action, outlet, dialect);

        self.state = NavState::ConfiguringOutlet;
        self.send_keys(&table.outlet_sequence(outlet)).await?;

        self.send_keys(&[table.action_key(action).to_string()]).await?;
        self.state = NavState::ActionPending;

        // Only reboot has its own confirmation screen; on/off take the
        // confirmation straight away.
        if action.needs_confirmation_prompt() {
            self.wait_for(REBOOT_PROMPT).await?;
        }
        self.send_keys(&[CONFIRM.to_string(), String::new()]).await?;

        self.wait_for(table.completion_signal).await?;
        self.state = NavState::ActionConfirmed;

        let notification = Notification {
            host: self.host.clone(),
            outlet: outlet.label(),
            action: action.label().to_string(),
        };
        self.notifier.notify(&notification);

        self.escape_to_main().await?;
        Ok(notification)
    }

    /// Wait for `text` and return the output that preceded it.
    async fn wait_for(&mut self, text: &str) -> Result<String> {
        let expected = self.session.expect_literal(text).await?;
        debug!("{}", expected.before);
        Ok(expected.before)
    }

    /// Send a sequence of menu keystrokes.
    async fn send_keys(&mut self, keys: &[String]) -> Result<()> {
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                if let Pacing::Delay(delay) = self.pacing {
                    tokio::time::sleep(delay).await;
                }
            }
            self.session.send(key).await?;
        }
        Ok(())
    }

    /// Unwind to the main menu. The result is not verified.
    async fn escape_to_main(&mut self) -> Result<()> {
        for _ in 0..ESCAPES_TO_MAIN {
            self.session.send_raw(ESCAPE).await?;
        }
        self.state = NavState::AtMainMenu;
        Ok(())
    }

    /// Log out and close the session.
    ///
    /// Best-effort: every step runs even if an earlier one failed, and
    /// failures are only logged so they never mask the error that led here.
    pub async fn logout(&mut self) {
        if self.state == NavState::LoggedOut {
            return;
        }

        // The logout key only means something once the menu is up
        if self.firmware.is_some() {
            if let Err(e) = self.session.send(LOGOUT).await {
                warn!("logout from {} failed: {}", self.host, e);
            }
        }
        if let Err(e) = self.session.send_eof().await {
            debug!("eof to {} failed: {}", self.host, e);
        }
        match self.session.read_all().await {
            Ok(rest) if !rest.is_empty() => debug!("[{}]", rest),
            Ok(_) => {}
            Err(e) => debug!("drain from {} failed: {}", self.host, e),
        }
        if let Err(e) = self.session.close().await {
            warn!("close of {} failed: {}", self.host, e);
        }

        self.state = NavState::LoggedOut;
        info!("DISCONNECTED from {}", self.host);
    }
}
