//! Notifications emitted after each completed outlet command.

use std::fmt;

use log::info;
use serde::Serialize;

/// A completed outlet command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// PDU the command ran against.
    pub host: String,

    /// Outlet label, e.g. `Outlet #3` or `ALL outlets`.
    pub outlet: String,

    /// Action label, e.g. `On` or `Rebooted`.
    pub action: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "APC {}: {} {}", self.host, self.outlet, self.action)
    }
}

/// Receiver of [`Notification`]s.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Notifier that writes to the log at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!("{}", notification);
    }
}

impl<F> Notifier for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}
