//! SSH session lifecycle and command execution.
//!
//! The [`RemoteExec`] trait is the seam between the install machinery and
//! the transport: production code uses [`SshExecutor`] (libssh2 via the
//! `ssh2` crate), tests inject recording doubles that return canned
//! outcomes without any network I/O.

use std::collections::HashMap;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use ssh2::Session;
use thiserror::Error;

use crate::target::Target;

/// Timeout for establishing the TCP connection to the target host.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one remote command run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Transport failures, classified into the three kinds reported to users.
///
/// The messages are what the client sees; the `ssh | ` prefix marks the
/// transport layer as the origin.
#[derive(Debug, Error)]
pub enum SshError {
    /// Password authentication was rejected by the target host.
    #[error("ssh | Ошибка аутентификации: проверьте введенные данные")]
    Auth(#[source] ssh2::Error),

    /// The target host could not be reached or the handshake failed.
    #[error("ssh | Ошибка подключения")]
    Connect(#[source] io::Error),

    /// Anything the transport reports after the session is up.
    #[error("ssh | Что-то пошло не так")]
    Session(#[source] ssh2::Error),

    /// The blocking transport task was cancelled or panicked.
    #[error("ssh | Что-то пошло не так")]
    Task(#[source] tokio::task::JoinError),
}

/// Remote command execution capability.
///
/// Exactly one command is in flight per session at any time; callers await
/// the outcome before issuing the next command.
#[allow(async_fn_in_trait)]
pub trait RemoteExec {
    /// Runs `command` to completion on the target host.
    ///
    /// # Errors
    ///
    /// Returns an [`SshError`] when the transport fails; a non-zero exit
    /// status of the remote command is NOT an error and is reported through
    /// [`CommandOutcome::exit_code`].
    async fn run(
        &self,
        command: &str,
        environment: Option<&HashMap<String, String>>,
    ) -> Result<CommandOutcome, SshError>;
}

/// An open, authenticated SSH session to one target host.
pub struct SshExecutor {
    session: Arc<Session>,
}

impl SshExecutor {
    /// Opens the TCP connection, performs the handshake and authenticates
    /// with the target's password.
    ///
    /// # Errors
    ///
    /// Fails with [`SshError::Connect`] when the host is unreachable or the
    /// handshake breaks, [`SshError::Auth`] when the credentials are
    /// rejected, [`SshError::Session`] otherwise. No retry is attempted.
    pub async fn connect(target: &Target) -> Result<Self, SshError> {
        let target = target.clone();
        let session = tokio::task::spawn_blocking(move || connect_blocking(&target))
            .await
            .map_err(SshError::Task)??;
        Ok(Self {
            session: Arc::new(session),
        })
    }

    /// Releases the underlying channel. Disconnect failures are logged and
    /// swallowed so cleanup can never mask an in-flight completion report.
    pub async fn close(self) {
        let session = self.session;
        let joined = tokio::task::spawn_blocking(move || {
            session.disconnect(None, "install session finished", None)
        })
        .await;
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::warn!(%error, "ssh disconnect failed"),
            Err(error) => tracing::warn!(%error, "ssh disconnect task failed"),
        }
    }
}

impl RemoteExec for SshExecutor {
    async fn run(
        &self,
        command: &str,
        environment: Option<&HashMap<String, String>>,
    ) -> Result<CommandOutcome, SshError> {
        tracing::info!(command, "executing remote command");
        let session = Arc::clone(&self.session);
        let command = command.to_owned();
        let environment = environment.cloned();
        tokio::task::spawn_blocking(move || {
            exec_blocking(&session, &command, environment.as_ref())
        })
        .await
        .map_err(SshError::Task)?
    }
}

fn connect_blocking(target: &Target) -> Result<Session, SshError> {
    let address = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(SshError::Connect)?
        .next()
        .ok_or_else(|| {
            SshError::Connect(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address resolved for {}", target.host),
            ))
        })?;

    let stream =
        TcpStream::connect_timeout(&address, CONNECT_TIMEOUT).map_err(SshError::Connect)?;

    let mut session = Session::new().map_err(SshError::Session)?;
    session.set_tcp_stream(stream);
    session
        .handshake()
        .map_err(|error| SshError::Connect(io::Error::other(error)))?;

    session
        .userauth_password(&target.username, &target.password)
        .map_err(SshError::Auth)?;
    if !session.authenticated() {
        // LIBSSH2_ERROR_AUTHENTICATION_FAILED
        return Err(SshError::Auth(ssh2::Error::from_errno(
            ssh2::ErrorCode::Session(-18),
        )));
    }

    tracing::debug!(host = %target.host, port = target.port, "ssh session established");
    Ok(session)
}

fn exec_blocking(
    session: &Session,
    command: &str,
    environment: Option<&HashMap<String, String>>,
) -> Result<CommandOutcome, SshError> {
    let mut channel = session.channel_session().map_err(SshError::Session)?;

    if let Some(vars) = environment {
        for (name, value) in vars {
            channel.setenv(name, value).map_err(SshError::Session)?;
        }
    }

    channel.exec(command).map_err(SshError::Session)?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(SshError::Connect)?;
    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(SshError::Connect)?;

    channel.wait_close().map_err(SshError::Session)?;
    let exit_code = channel.exit_status().map_err(SshError::Session)?;

    Ok(CommandOutcome {
        exit_code,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_error() -> ssh2::Error {
        ssh2::Error::from_errno(ssh2::ErrorCode::Session(-18))
    }

    #[test]
    fn auth_error_message_is_user_facing() {
        let message = SshError::Auth(session_error()).to_string();
        assert_eq!(
            message,
            "ssh | Ошибка аутентификации: проверьте введенные данные"
        );
    }

    #[test]
    fn connect_error_message_is_user_facing() {
        let message = SshError::Connect(io::Error::other("refused")).to_string();
        assert_eq!(message, "ssh | Ошибка подключения");
    }

    #[test]
    fn session_error_message_is_generic_fallback() {
        let message = SshError::Session(session_error()).to_string();
        assert_eq!(message, "ssh | Что-то пошло не так");
    }

    #[test]
    fn errors_carry_their_source() {
        use std::error::Error as _;
        let error = SshError::Connect(io::Error::other("refused"));
        assert!(error.source().is_some());
    }
}
