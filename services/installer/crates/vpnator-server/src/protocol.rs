//! Wire contract with the installer client.
//!
//! Inbound: space-delimited text frames of the form
//! `install <kind> <host[:port]> <username> <password> [acc_user] [acc_pass]`.
//! Outbound: plain text frames (human-readable status/error lines and the
//! literal completion sentinel) with no envelope or versioning.

use std::fmt;

use thiserror::Error;
use vpnator_ssh::Target;

/// First token of every frame the endpoint dispatches.
pub const INSTALL_KEYWORD: &str = "install";

/// Reserved token signalling that no further events follow for the current
/// request. Clients stop waiting when they see this frame.
pub const COMPLETE_SENTINEL: &str = "VPNATOR-COMPLETE";

/// The closed set of provisionable VPN kinds.
///
/// Adding a kind is one new variant plus its script under `scripts/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpnKind {
    Openconnect,
    Xray,
    Outline,
}

impl VpnKind {
    pub const ALL: [VpnKind; 3] = [VpnKind::Openconnect, VpnKind::Xray, VpnKind::Outline];

    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "openconnect" => Some(Self::Openconnect),
            "xray" => Some(Self::Xray),
            "outline" => Some(Self::Outline),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Openconnect => "openconnect",
            Self::Xray => "xray",
            Self::Outline => "outline",
        }
    }

    /// Embedded installation script for this kind.
    #[must_use]
    pub fn script_file(self) -> &'static str {
        match self {
            Self::Openconnect => "openconnect.sh",
            Self::Xray => "xray.sh",
            Self::Outline => "outline.sh",
        }
    }

    /// File a save-output capture is written to, relative to the configured
    /// artifact directory. Overwritten on each save.
    #[must_use]
    pub fn artifact_file(self) -> &'static str {
        match self {
            Self::Openconnect => "openconnect-server.txt",
            Self::Xray => "xray-client.json",
            Self::Outline => "outline-access.json",
        }
    }
}

impl fmt::Display for VpnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rejected install frame. The message is what the client sees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Неизвестный тип VPN: {0}")]
    UnknownKind(String),

    #[error("Неполный запрос: ожидается install <vpn> <host> <username> <password>")]
    MissingArguments,
}

/// One parsed install request.
///
/// The account fields are only demanded when the selected script injects
/// credentials; their presence is checked at that directive line, not here.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub kind: VpnKind,
    pub target: Target,
    pub account_username: Option<String>,
    pub account_password: Option<String>,
}

impl InstallRequest {
    /// Parses the positional fields following the `install` keyword.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::UnknownKind`] for a kind outside the closed
    /// set and [`RequestError::MissingArguments`] when fewer than four
    /// fields are present.
    pub fn parse(args: &[&str]) -> Result<Self, RequestError> {
        let (&kind_token, rest) = args.split_first().ok_or(RequestError::MissingArguments)?;
        let kind = VpnKind::parse(kind_token)
            .ok_or_else(|| RequestError::UnknownKind(kind_token.to_string()))?;
        let [host, username, password, account @ ..] = rest else {
            return Err(RequestError::MissingArguments);
        };
        Ok(Self {
            kind,
            target: Target::new(host, username, password),
            account_username: account.first().map(ToString::to_string),
            account_password: account.get(1).map(ToString::to_string),
        })
    }

    /// True when both account credential fields were supplied.
    #[must_use]
    pub fn has_account(&self) -> bool {
        self.account_username.is_some() && self.account_password.is_some()
    }
}

/// One unit of information emitted toward the client during an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Human-readable progress line forwarded to the client.
    Status(String),
    /// Internal line, written to the server log only — never sent.
    Log(String),
    /// Human-readable failure description forwarded to the client.
    Error(String),
    /// Terminal signal; always the last event of a request that reached
    /// the execution phase.
    Complete,
}

impl ProgressEvent {
    /// The text frame delivered to the client, or `None` for internal-only
    /// events.
    #[must_use]
    pub fn client_frame(&self) -> Option<&str> {
        match self {
            Self::Status(text) | Self::Error(text) => Some(text),
            Self::Log(_) => None,
            Self::Complete => Some(COMPLETE_SENTINEL),
        }
    }
}

/// Delivery seam for [`ProgressEvent`]s.
///
/// The production sink writes to the client's WebSocket and absorbs
/// disconnects itself; emitting is therefore infallible from the caller's
/// side, and session logic never observes delivery problems.
#[allow(async_fn_in_trait)]
pub trait EventSink {
    async fn emit(&mut self, event: ProgressEvent);

    /// True once the client is known to be gone. Emitting stays legal (and
    /// is dropped silently); callers may use this to stop producing work
    /// nobody will see.
    fn closed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_request() {
        let request = InstallRequest::parse(&["outline", "10.0.0.5", "root", "secret"])
            .expect("request should parse");
        assert_eq!(request.kind, VpnKind::Outline);
        assert_eq!(request.target.host, "10.0.0.5");
        assert_eq!(request.target.port, 22);
        assert!(!request.has_account());
    }

    #[test]
    fn parses_request_with_account_credentials() {
        let request = InstallRequest::parse(&[
            "openconnect",
            "10.0.0.5:2222",
            "root",
            "secret",
            "alice",
            "wonderland",
        ])
        .expect("request should parse");
        assert_eq!(request.target.port, 2222);
        assert_eq!(request.account_username.as_deref(), Some("alice"));
        assert_eq!(request.account_password.as_deref(), Some("wonderland"));
        assert!(request.has_account());
    }

    #[test]
    fn account_username_alone_is_not_a_full_account() {
        let request = InstallRequest::parse(&["xray", "h", "u", "p", "alice"])
            .expect("request should parse");
        assert!(!request.has_account());
    }

    #[test]
    fn unknown_kind_is_rejected_with_the_token() {
        let error = InstallRequest::parse(&["wireguard", "h", "u", "p"])
            .expect_err("kind outside the set must be rejected");
        assert_eq!(error, RequestError::UnknownKind("wireguard".to_string()));
        assert_eq!(error.to_string(), "Неизвестный тип VPN: wireguard");
    }

    #[test]
    fn short_request_is_rejected() {
        for args in [&[][..], &["outline"][..], &["outline", "h", "u"][..]] {
            let error = InstallRequest::parse(args).expect_err("short request must be rejected");
            assert_eq!(error, RequestError::MissingArguments);
        }
    }

    #[test]
    fn kind_tokens_round_trip() {
        for kind in VpnKind::ALL {
            assert_eq!(VpnKind::parse(kind.name()), Some(kind));
        }
    }

    #[test]
    fn artifact_files_are_distinct_per_kind() {
        let names: Vec<_> = VpnKind::ALL.iter().map(|k| k.artifact_file()).collect();
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len());
    }

    #[test]
    fn log_events_have_no_client_frame() {
        assert_eq!(ProgressEvent::Log("noise".into()).client_frame(), None);
        assert_eq!(
            ProgressEvent::Complete.client_frame(),
            Some(COMPLETE_SENTINEL)
        );
        assert_eq!(
            ProgressEvent::Status("ready".into()).client_frame(),
            Some("ready")
        );
    }
}
