//! Connection endpoint configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

/// Default username of an APC management card.
pub const DEFAULT_USERNAME: &str = "apc";

/// Default password of an APC management card.
pub const DEFAULT_PASSWORD: &str = "apc";

/// Which remote-login protocol carries the menu session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Plain telnet on port 23. Every APC firmware supports it.
    #[default]
    Telnet,

    /// SSH on port 22 (newer firmware only).
    Ssh,
}

impl TransportKind {
    /// Port used when the endpoint does not name one.
    pub fn default_port(self) -> u16 {
        match self {
            TransportKind::Telnet => 23,
            TransportKind::Ssh => 22,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Telnet => f.write_str("telnet"),
            TransportKind::Ssh => f.write_str("ssh"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telnet" => Ok(TransportKind::Telnet),
            "ssh" => Ok(TransportKind::Ssh),
            other => Err(format!("unknown transport '{other}' (expected telnet or ssh)")),
        }
    }
}

/// The PDU to talk to and the credentials to log in with.
///
/// Immutable once a session starts.
#[derive(Debug)]
pub struct Endpoint {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Port override; `None` means the transport's default.
    pub port: Option<u16>,

    /// Menu (or SSH) username.
    pub username: String,

    /// Menu (or SSH) password.
    pub password: SecretString,

    /// Transport protocol.
    pub transport: TransportKind,

    /// Bound on establishing the connection.
    pub connect_timeout: Duration,
}

impl Endpoint {
    /// Endpoint for `host` with factory-default credentials over telnet.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: DEFAULT_USERNAME.to_string(),
            password: SecretString::from(DEFAULT_PASSWORD.to_string()),
            transport: TransportKind::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.transport.default_port())
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_endpoint_defaults() {
        let endpoint = Endpoint::new("10.0.0.5");
        assert_eq!(endpoint.username, "apc");
        assert_eq!(endpoint.password.expose_secret(), "apc");
        assert_eq!(endpoint.transport, TransportKind::Telnet);
        assert_eq!(endpoint.socket_addr(), "10.0.0.5:23");
    }

    #[test]
    fn test_port_follows_transport() {
        let mut endpoint = Endpoint::new("pdu1");
        endpoint.transport = TransportKind::Ssh;
        assert_eq!(endpoint.port(), 22);

        endpoint.port = Some(2323);
        assert_eq!(endpoint.socket_addr(), "pdu1:2323");
    }

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("telnet".parse::<TransportKind>(), Ok(TransportKind::Telnet));
        assert_eq!("SSH".parse::<TransportKind>(), Ok(TransportKind::Ssh));
        assert!("snmp".parse::<TransportKind>().is_err());
        assert_eq!(TransportKind::Ssh.to_string(), "ssh");
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let endpoint = Endpoint::new("pdu1");
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("password: \"apc\""));
        assert!(debug.contains("REDACTED"));
    }
}
