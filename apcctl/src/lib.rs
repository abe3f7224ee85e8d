//! # apcctl
//!
//! Outlet power control for APC network PDUs through their text menu.
//!
//! APC rack PDUs expose outlet control as a numbered menu over telnet (and,
//! on newer firmware, SSH). apcctl logs in, detects the firmware's menu
//! dialect, walks the menu to the outlet, confirms the action and logs out,
//! serialized across processes by a lock file.
//!
//! ## Features
//!
//! - Async telnet and SSH transports (tokio, russh)
//! - ANSI-stripping pattern buffer for prompt matching
//! - Legacy and v3 firmware menu dialects
//! - Cross-process session lock
//! - Interactive pass-through for debugging menu layouts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apcctl::ControllerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), apcctl::Error> {
//!     let pdu = ControllerBuilder::new("10.0.0.5")
//!         .username("apc")
//!         .password("apc")
//!         .build()?;
//!
//!     let done = pdu.turn_off("3").await?;
//!     println!("{done}");
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod lock;
pub mod transport;

// Re-export main types for convenience
pub use driver::{
    ControllerBuilder, DebugSession, Dialect, FirmwareVersion, Notification, Notifier,
    OutletAddress, Pacing, PduController, PowerAction,
};
pub use error::Error;
pub use lock::{LockConfig, SessionLock};
pub use transport::{Endpoint, TransportKind};
