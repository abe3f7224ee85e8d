//! Outlet power actions.

use std::fmt;

use serde::Serialize;

/// What to do with an outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PowerAction {
    On,
    Off,
    Reboot,
}

impl PowerAction {
    /// Past-tense label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            PowerAction::On => "On",
            PowerAction::Off => "Off",
            PowerAction::Reboot => "Rebooted",
        }
    }

    /// Whether the device asks for a separate confirmation screen.
    pub fn needs_confirmation_prompt(self) -> bool {
        matches!(self, PowerAction::Reboot)
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerAction::On => f.write_str("on"),
            PowerAction::Off => f.write_str("off"),
            PowerAction::Reboot => f.write_str("reboot"),
        }
    }
}
