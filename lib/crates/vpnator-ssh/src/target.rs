//! Target host descriptor — host/port/credential tuple for one install.

/// Port used when the host string does not carry an explicit one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Resolved connection coordinates for a target host.
///
/// Immutable once constructed; one `Target` corresponds to one install
/// request and is never shared across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Target {
    /// Builds a target from a raw host string and credentials.
    ///
    /// `host` may carry an explicit port as `host:port`. When the trailing
    /// segment does not parse as a port number, the whole string is kept as
    /// the host and [`DEFAULT_SSH_PORT`] applies.
    #[must_use]
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        let (host, port) = split_host_port(host);
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

fn split_host_port(host: &str) -> (&str, u16) {
    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(port) => (name, port),
            Err(_) => (host, DEFAULT_SSH_PORT),
        },
        None => (host, DEFAULT_SSH_PORT),
    }
}
