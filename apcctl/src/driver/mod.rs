//! High-level driver for the PDU menu.
//!
//! The driver layer turns an outlet command into menu keystrokes:
//! [`dialect`] holds the per-firmware keystroke tables, [`Navigator`]
//! walks the menu over a [`TerminalSession`](crate::channel::TerminalSession),
//! and [`PduController`] wraps the whole locked session behind one call.

mod action;
mod builder;
mod controller;
pub mod dialect;
mod interactive;
mod navigator;
mod notify;
mod outlet;

pub use action::PowerAction;
pub use builder::ControllerBuilder;
pub use controller::{DebugSession, PduController};
pub use dialect::{Dialect, FirmwareVersion, KeystrokeTable};
pub use interactive::{PassthroughEnd, passthrough};
pub use navigator::{NavState, Navigator, PASSWORD_PROMPT, Pacing, USERNAME_PROMPT};
pub use notify::{LogNotifier, Notification, Notifier};
pub use outlet::{ALL_OUTLETS_INDEX, OutletAddress};
