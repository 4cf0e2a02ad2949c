//! Install session controller.
//!
//! Orchestrates one install request end-to-end: `Received` (parse) →
//! `Connecting` (open the remote session) → `Executing` (run the script) →
//! `Completed`. Once the execution phase is entered, the completion
//! sentinel and the session release are owed on every exit path, including
//! mid-script client disconnects, which the sink absorbs.

use std::path::Path;

use vpnator_ssh::{RemoteExec, SshError, SshExecutor, Target};

use crate::assets;
use crate::protocol::{EventSink, InstallRequest, ProgressEvent};
use crate::script::Interpreter;

/// Opens remote sessions for install requests.
///
/// The seam that lets integration tests drive the whole controller with a
/// recorded transport instead of a live SSH connection.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Exec: RemoteExec;

    /// Opens an authenticated session to `target`.
    ///
    /// # Errors
    ///
    /// Propagates the transport's classified failure; the caller maps it
    /// onto a client-facing error message.
    async fn connect(&self, target: &Target) -> Result<Self::Exec, SshError>;

    /// Best-effort release of a session produced by [`Connector::connect`].
    async fn close(&self, exec: Self::Exec);
}

/// Production connector backed by [`SshExecutor`].
pub struct SshConnector;

impl Connector for SshConnector {
    type Exec = SshExecutor;

    async fn connect(&self, target: &Target) -> Result<SshExecutor, SshError> {
        SshExecutor::connect(target).await
    }

    async fn close(&self, exec: SshExecutor) {
        exec.close().await;
    }
}

/// Handles one install request from parsing to completion.
///
/// `args` are the whitespace-split tokens after the `install` keyword.
/// Requests rejected before a remote session is attempted (unknown kind,
/// short argument list, connect/auth failure) end with an error frame and
/// no completion sentinel; once a session is open, exactly one sentinel is
/// emitted as the last event and the session is released exactly once.
pub async fn handle_install<C: Connector>(
    connector: &C,
    artifact_dir: &Path,
    args: &[&str],
    sink: &mut impl EventSink,
) {
    // Received
    let request = match InstallRequest::parse(args) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(%error, "install request rejected");
            sink.emit(ProgressEvent::Error(error.to_string())).await;
            return;
        }
    };
    tracing::info!(
        kind = %request.kind,
        host = %request.target.host,
        port = request.target.port,
        "install request accepted"
    );

    // Connecting
    let executor = match connector.connect(&request.target).await {
        Ok(executor) => executor,
        Err(error) => {
            tracing::error!(%error, host = %request.target.host, "remote session not opened");
            sink.emit(ProgressEvent::Error(error.to_string())).await;
            return;
        }
    };

    // Executing — sentinel and release are owed from here on.
    match assets::script_source(request.kind) {
        Ok(script) => {
            Interpreter::new(&executor, &request, artifact_dir)
                .run(script, sink)
                .await;
        }
        Err(error) => {
            tracing::error!(%error, kind = %request.kind, "installation script missing");
            sink.emit(ProgressEvent::Error(format!(
                "Протокол {} не поддерживается",
                request.kind
            )))
            .await;
        }
    }

    sink.emit(ProgressEvent::Complete).await;
    connector.close(executor).await;
}
