//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::Parser;
use vpnator_ssh::{RemoteExec, SshExecutor, Target};

/// Run a command on a VPN target host over SSH
///
/// Connection settings come from flags or from the `REMOTE_*` environment
/// variables (a `.env` file next to the binary is honored).
#[derive(Parser)]
#[command(name = "vpnator", version)]
pub struct Cli {
    /// Command to execute on the target host
    #[arg(default_value = "ls -la")]
    pub command: String,

    /// Target host, `host` or `host:port`
    #[arg(long, env = "REMOTE_HOST")]
    pub host: String,

    /// SSH username
    #[arg(long, env = "REMOTE_USERNAME")]
    pub username: String,

    /// SSH password
    #[arg(long, env = "REMOTE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl Cli {
    /// Execute the remote command and print both captured streams.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be opened or the remote
    /// command exits with a non-zero status.
    pub async fn run(self) -> Result<()> {
        let target = Target::new(&self.host, &self.username, &self.password);
        let executor = SshExecutor::connect(&target).await?;

        let outcome = executor.run(&self.command, None).await;
        executor.close().await;
        let outcome = outcome?;

        print!("{}", outcome.stdout);
        if !outcome.stderr.is_empty() {
            eprint!("{}", outcome.stderr);
        }
        anyhow::ensure!(
            outcome.exit_code == 0,
            "remote command exited with status {}",
            outcome.exit_code
        );
        Ok(())
    }
}
