//! Line-oriented installation script interpreter.
//!
//! Scripts are flat shell files where directives ride on comment syntax:
//! a status-report prefix line, plus two suffix directives that co-occur
//! with a runnable line (credential injection and output capture). Every
//! other non-comment, non-blank line is executed verbatim on the target
//! host, strictly in file order, aborting on the first failure.

use std::path::Path;

use vpnator_ssh::RemoteExec;

use crate::protocol::{EventSink, InstallRequest, ProgressEvent};

/// Status-report directive: the rest of the line is progress text for the
/// client; the line itself is never executed.
pub const STATUS_PREFIX: &str = "# VPNATOR-STATUS-REPORT";

/// Suffix directive demanding the request's account credentials; the line
/// runs with two exported assignments prepended.
pub const SET_USER_VARS_SUFFIX: &str = "# VPNATOR-SET-USER-VARS";

/// Suffix directive capturing the line's stdout into the kind-specific
/// artifact file.
pub const SAVE_OUTPUT_SUFFIX: &str = "# VPNATOR-SAVE-OUTPUT";

const MISSING_ACCOUNT_MESSAGE: &str = "Не указаны учетные данные пользователя VPN";

/// Classification of one raw script line.
///
/// A pure function of the line content (see [`classify`]); interpreter
/// state only decides what happens to the classified line, never how it is
/// classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Progress text reported to the client; never executed.
    Status(&'a str),
    /// Runnable line that injects the account credentials before running.
    SetUserVars(&'a str),
    /// Runnable line whose stdout is persisted after it succeeds.
    SaveOutput(&'a str),
    /// Blank line or plain comment; no event, no execution.
    Skip,
    /// Plain remote command, executed verbatim.
    Command(&'a str),
}

/// Classifies one raw line. Surrounding whitespace is ignored.
#[must_use]
pub fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if let Some(payload) = line.strip_prefix(STATUS_PREFIX) {
        return LineKind::Status(payload.trim());
    }
    if line.ends_with(SET_USER_VARS_SUFFIX) {
        return LineKind::SetUserVars(line);
    }
    if line.ends_with(SAVE_OUTPUT_SUFFIX) {
        return LineKind::SaveOutput(line);
    }
    if line.is_empty() || line.starts_with('#') {
        return LineKind::Skip;
    }
    LineKind::Command(line)
}

/// Drives one installation script against an open remote session.
///
/// The interpreter emits every event except the terminal completion
/// signal, which the caller owes on all return paths.
pub struct Interpreter<'a, E> {
    executor: &'a E,
    request: &'a InstallRequest,
    artifact_dir: &'a Path,
    save_output: bool,
}

impl<'a, E: RemoteExec> Interpreter<'a, E> {
    pub fn new(executor: &'a E, request: &'a InstallRequest, artifact_dir: &'a Path) -> Self {
        Self {
            executor,
            request,
            artifact_dir,
            save_output: false,
        }
    }

    /// Runs `script` line by line until the end, the first failure, or a
    /// client disconnect. A command already dispatched when the client
    /// vanishes still finishes; only then does interpretation stop.
    pub async fn run(mut self, script: &str, sink: &mut impl EventSink) {
        for line in script.lines() {
            if sink.closed() {
                tracing::warn!("client gone, script interpretation stopped");
                return;
            }
            match classify(line) {
                LineKind::Status(payload) => {
                    tracing::info!(status = payload, "script status");
                    sink.emit(ProgressEvent::Status(payload.to_string())).await;
                }
                LineKind::Skip => {}
                LineKind::SetUserVars(line) => {
                    let Some(command) = self.inject_account(line) else {
                        tracing::warn!("script demands account credentials, request has none");
                        sink.emit(ProgressEvent::Error(MISSING_ACCOUNT_MESSAGE.to_string()))
                            .await;
                        return;
                    };
                    if !self.execute(&command, sink).await {
                        return;
                    }
                }
                LineKind::SaveOutput(line) => {
                    self.save_output = true;
                    if !self.execute(line, sink).await {
                        return;
                    }
                }
                LineKind::Command(line) => {
                    if !self.execute(line, sink).await {
                        return;
                    }
                }
            }
        }
    }

    /// Executes one command line; returns `false` when the script must
    /// terminate.
    async fn execute(&mut self, command: &str, sink: &mut impl EventSink) -> bool {
        // The capture flag is consumed whether or not the command succeeds.
        let save = std::mem::take(&mut self.save_output);

        let outcome = match self.executor.run(command, None).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%error, "remote execution failed");
                sink.emit(ProgressEvent::Error(error.to_string())).await;
                return false;
            }
        };

        if outcome.exit_code != 0 {
            sink.emit(ProgressEvent::Error(format!(
                "Ошибка в процессе установки: {}",
                outcome.stderr
            )))
            .await;
            return false;
        }

        sink.emit(ProgressEvent::Log(outcome.stdout.clone())).await;

        if save {
            let path = self.artifact_dir.join(self.request.kind.artifact_file());
            if let Err(error) = std::fs::write(&path, &outcome.stdout) {
                tracing::error!(%error, path = %path.display(), "saving captured output failed");
                sink.emit(ProgressEvent::Error(
                    "Ошибка сохранения данных доступа".to_string(),
                ))
                .await;
                return false;
            }
            tracing::info!(path = %path.display(), "captured output saved");
        }

        true
    }

    /// Rewrites a set-user-vars line with the account credentials exported
    /// ahead of the original command, or `None` when the request carries no
    /// full account.
    fn inject_account(&self, line: &str) -> Option<String> {
        let username = self.request.account_username.as_deref()?;
        let password = self.request.account_password.as_deref()?;
        Some(format!(
            "export VPN_USER='{}'; export VPN_PASSWORD='{}'; {line}",
            shell_quote(username),
            shell_quote(password),
        ))
    }
}

/// Escapes a value for interpolation inside a single-quoted shell string.
fn shell_quote(value: &str) -> String {
    value.replace('\'', "'\"'\"'")
}
