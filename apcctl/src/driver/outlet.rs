//! Outlet token resolution.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{DriverError, Error, Result};

/// Outlet number the firmware reserves for "all outlets".
pub const ALL_OUTLETS_INDEX: u32 = 9;

/// Validated target of a power action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutletAddress {
    /// Every outlet on the PDU.
    All,
    /// One outlet, 1-based as printed on the unit.
    Single(u32),
}

impl OutletAddress {
    /// Resolve a user-supplied outlet token.
    ///
    /// `*`, `+` and `9` mean all outlets; any other token must be a
    /// non-negative integer.
    pub fn resolve(token: &str) -> Result<Self> {
        if matches!(token, "*" | "+" | "9") {
            return Ok(OutletAddress::All);
        }
        token
            .parse::<u32>()
            .map(OutletAddress::Single)
            .map_err(|_| {
                DriverError::InvalidOutlet {
                    token: token.to_string(),
                }
                .into()
            })
    }

    /// Outlet number typed into the menu.
    pub fn index(&self) -> u32 {
        match self {
            OutletAddress::All => ALL_OUTLETS_INDEX,
            OutletAddress::Single(n) => *n,
        }
    }

    /// The outlet number as a keystroke.
    pub fn menu_token(&self) -> String {
        self.index().to_string()
    }

    /// Human-readable label used in notifications.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OutletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutletAddress::All => f.write_str("ALL outlets"),
            OutletAddress::Single(n) => write!(f, "Outlet #{n}"),
        }
    }
}

impl FromStr for OutletAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_outlet_aliases() {
        for token in ["*", "+", "9"] {
            let outlet = OutletAddress::resolve(token).unwrap();
            assert_eq!(outlet, OutletAddress::All, "token {token}");
            assert_eq!(outlet.label(), "ALL outlets");
            assert_eq!(outlet.menu_token(), "9");
        }
    }

    #[test]
    fn test_numeric_outlets() {
        for n in [0u32, 1, 3, 8, 10, 24, 4096] {
            let outlet = OutletAddress::resolve(&n.to_string()).unwrap();
            assert_eq!(outlet, OutletAddress::Single(n));
            assert_eq!(outlet.label(), format!("Outlet #{n}"));
            assert_eq!(outlet.index(), n);
        }
    }

    #[test]
    fn test_invalid_tokens() {
        for token in ["abc", "", "-1", "3.5", "one", "**", "1 2"] {
            match OutletAddress::resolve(token) {
                Err(Error::Driver(DriverError::InvalidOutlet { token: t })) => {
                    assert_eq!(t, token)
                }
                other => panic!("expected invalid outlet for {token:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_from_str() {
        let outlet: OutletAddress = "5".parse().unwrap();
        assert_eq!(outlet, OutletAddress::Single(5));
        assert!("x".parse::<OutletAddress>().is_err());
    }
}
