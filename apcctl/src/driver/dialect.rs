//! Firmware version detection and the per-dialect keystroke tables.
//!
//! APC firmware comes in two menu layouts. Version 3 firmware inserts an
//! extra "Outlet Management" level above the outlet list and renumbers the
//! outlet control actions; everything else uses the older layout.
//!
//! # Menu paths
//!
//! ```text
//! Legacy:  1 Device Manager > 1 Outlet Control > <n> Outlet > 1 Control Outlet
//! V3:      1 Device Manager > 2 Outlet Management > 1 Outlet Control
//!          > <n> Outlet > 1 Control Outlet
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::action::PowerAction;
use super::outlet::OutletAddress;

/// Banner text that follows a successful menu login.
pub const LOGIN_BANNER_END: &str = "Communication Established";

/// Prompt shown before a reboot is confirmed.
pub const REBOOT_PROMPT: &str = "Immediate Reboot";

/// Confirmation word the menu requires for outlet commands.
pub const CONFIRM: &str = "YES";

/// Main-menu entry that logs out.
pub const LOGOUT: &str = "4";

/// Escape key: backs out one menu level.
pub const ESCAPE: &[u8] = b"\x1b";

/// Escapes sent to unwind to the main menu from the deepest outlet screen.
///
/// Unverified: the driver does not check that the main menu was reached.
pub const ESCAPES_TO_MAIN: usize = 6;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" v([0-9]+)\.([0-9]+)\.([0-9]+)").expect("firmware version pattern is valid")
});

/// Firmware version from the login banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    /// Extract the first usable ` vX.Y.Z` version from a login banner.
    ///
    /// Candidates whose components overflow are skipped.
    pub fn from_banner(banner: &str) -> Option<Self> {
        VERSION_PATTERN.captures_iter(banner).find_map(|caps| {
            Some(Self {
                major: caps[1].parse().ok()?,
                minor: caps[2].parse().ok()?,
                patch: caps[3].parse().ok()?,
            })
        })
    }

    /// Menu dialect spoken by this firmware.
    pub fn dialect(&self) -> Dialect {
        Dialect::from_major(self.major)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Menu keystroke dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    /// Firmware before version 3.
    Legacy,
    /// Version 3 firmware.
    V3,
}

impl Dialect {
    /// Dialect for a firmware major version. Only major version 3 uses the
    /// newer layout.
    pub fn from_major(major: u32) -> Self {
        if major == 3 { Dialect::V3 } else { Dialect::Legacy }
    }

    /// Keystroke table for this dialect.
    pub fn table(self) -> &'static KeystrokeTable {
        match self {
            Dialect::Legacy => &LEGACY,
            Dialect::V3 => &V3,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Legacy => f.write_str("legacy"),
            Dialect::V3 => f.write_str("v3+"),
        }
    }
}

/// One entry in a menu walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKey {
    /// Fixed menu selection.
    Select(&'static str),
    /// The outlet number being configured.
    Outlet,
}

/// Keystrokes for one dialect.
#[derive(Debug)]
pub struct KeystrokeTable {
    /// From the main menu down to the selected outlet's control screen.
    pub outlet_menu: &'static [MenuKey],
    pub immediate_on: &'static str,
    pub immediate_off: &'static str,
    pub immediate_reboot: &'static str,
    /// Text the device prints once a command went through.
    pub completion_signal: &'static str,
}

static LEGACY: KeystrokeTable = KeystrokeTable {
    outlet_menu: &[
        MenuKey::Select("1"),
        MenuKey::Select("1"),
        MenuKey::Outlet,
        MenuKey::Select("1"),
    ],
    immediate_on: "1",
    immediate_off: "2",
    immediate_reboot: "3",
    completion_signal: "Outlet State",
};

static V3: KeystrokeTable = KeystrokeTable {
    outlet_menu: &[
        MenuKey::Select("1"),
        MenuKey::Select("2"),
        MenuKey::Select("1"),
        MenuKey::Outlet,
        MenuKey::Select("1"),
    ],
    immediate_on: "1",
    immediate_off: "3",
    immediate_reboot: "4",
    completion_signal: "Command successfully issued",
};

impl KeystrokeTable {
    /// Keystrokes that open the control screen for `outlet`.
    pub fn outlet_sequence(&self, outlet: OutletAddress) -> Vec<String> {
        self.outlet_menu
            .iter()
            .map(|key| match key {
                MenuKey::Select(s) => (*s).to_string(),
                MenuKey::Outlet => outlet.menu_token(),
            })
            .collect()
    }

    /// Keystroke selecting `action` on the outlet control screen.
    pub fn action_key(&self, action: PowerAction) -> &'static str {
        match action {
            PowerAction::On => self.immediate_on,
            PowerAction::Off => self.immediate_off,
            PowerAction::Reboot => self.immediate_reboot,
        }
    }
}
