//! Embedded installation scripts — one shell script per supported VPN kind.
//!
//! `include_dir!` compiles everything under `scripts/` into the binary, so
//! kind-to-script lookup keeps working when the server ships as a single
//! standalone bundle with no files next to it.

use anyhow::{Result, anyhow};
use include_dir::{Dir, include_dir};

use crate::protocol::VpnKind;

static EMBEDDED_SCRIPTS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/scripts");

/// Returns the installation script source for `kind`.
///
/// # Errors
///
/// Returns an error when no script is embedded for the kind or the file is
/// not valid UTF-8.
pub fn script_source(kind: VpnKind) -> Result<&'static str> {
    EMBEDDED_SCRIPTS
        .get_file(kind.script_file())
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| anyhow!("no installation script embedded for {kind}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{self, LineKind};

    #[test]
    fn every_kind_has_an_embedded_script() {
        for kind in VpnKind::ALL {
            let source = script_source(kind)
                .unwrap_or_else(|e| panic!("script for {kind} must be embedded: {e}"));
            assert!(!source.trim().is_empty(), "script for {kind} is empty");
        }
    }

    #[test]
    fn every_script_reports_status_and_runs_commands() {
        for kind in VpnKind::ALL {
            let source = script_source(kind).expect("script should be embedded");
            let kinds: Vec<_> = source.lines().map(script::classify).collect();
            assert!(
                kinds.iter().any(|k| matches!(k, LineKind::Status(_))),
                "script for {kind} never reports status"
            );
            assert!(
                kinds
                    .iter()
                    .any(|k| matches!(k, LineKind::Command(_) | LineKind::SaveOutput(_))),
                "script for {kind} has no runnable line"
            );
        }
    }

    #[test]
    fn openconnect_script_injects_account_credentials() {
        let source = script_source(VpnKind::Openconnect).expect("script should be embedded");
        assert!(
            source
                .lines()
                .map(script::classify)
                .any(|k| matches!(k, LineKind::SetUserVars(_))),
            "openconnect script must create the VPN account"
        );
    }
}
