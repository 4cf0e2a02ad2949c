//! Remote command execution over SSH for vpnator.
//!
//! One [`SshExecutor`] owns one authenticated session to a target host and
//! runs a single command at a time, returning the exit status together with
//! both captured output streams. The blocking libssh2 calls are dispatched
//! through `tokio::task::spawn_blocking` so async callers stay responsive
//! while a remote command runs.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod executor;
pub mod target;

pub use executor::{CommandOutcome, RemoteExec, SshError, SshExecutor};
pub use target::{DEFAULT_SSH_PORT, Target};
