use crate::{
    common::error::{Result, UpgradeCommand, UpgradeCommandFailed},
    config::EnvOverlay,
};
use async_trait::async_trait;
use snafu::{ensure, ResultExt};
use tokio::process::Command;
use tracing::debug;

/// Captured output of a completed upgrade command.
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs an external upgrade mechanism with a given environment overlay and
/// argument list, capturing its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], env: &EnvOverlay) -> Result<CommandOutput>;
}

/// CommandRunner backed by real process execution. The overlay is layered over
/// the inherited environment of the child; the process-wide environment is
/// left untouched.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, program: &str, args: &[String], env: &EnvOverlay) -> Result<CommandOutput> {
        debug!(command = %program, ?args, "Running upgrade command");

        let output = Command::new(program)
            .args(args)
            .envs(env.iter())
            .output()
            .await
            .context(UpgradeCommand {
                command: program.to_string(),
                args: args.to_vec(),
            })?;

        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
        debug!(command = %program, %stdout, "Upgrade command standard output");

        ensure!(
            output.status.success(),
            UpgradeCommandFailed {
                command: program.to_string(),
                args: args.to_vec(),
                std_err: stderr
            }
        );

        Ok(CommandOutput { stdout, stderr })
    }
}
