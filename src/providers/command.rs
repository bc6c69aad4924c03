//! Child-process helper shared by the CLI-backed providers.

use std::io;

use tokio::process::Command;
use tracing::trace;

pub(crate) struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout followed by stderr, the way a terminal would show them.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, _) => self.stderr.trim_end().to_string(),
        }
    }
}

/// Runs `cmd` to completion capturing both streams.
///
/// The child is killed if the returned future is dropped. Errors only when the
/// binary cannot be spawned; a non-zero exit is reported through `success`.
pub(crate) async fn run(cmd: &mut Command) -> io::Result<CommandOutput> {
    trace!(command = ?cmd.as_std(), "spawning");
    let output = cmd.kill_on_drop(true).output().await?;
    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
