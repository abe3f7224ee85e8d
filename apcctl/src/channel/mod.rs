//! Channel layer: the terminal session the menu driver talks through.
//!
//! This module handles line-oriented sending, pattern-based waiting and
//! ANSI stripping on top of a raw [`Transport`](crate::transport::Transport).

mod buffer;
mod session;

pub use buffer::PatternBuffer;
pub use session::{DEFAULT_EXPECT_TIMEOUT, Expected, LINE_TERMINATOR, TerminalSession};
