use crate::error::SshError;
use std::path::Path;
use std::process::{Command, ExitStatus};

/// Runs `cmd` to completion and maps a non-zero exit to `SshError::Failed`.
pub(crate) fn check(cmd: &mut Command, program: &'static str) -> Result<(), SshError> {
    let status = status(cmd, program)?;

    if !status.success() {
        tracing::warn!(program, %status, "command failed");
        return Err(SshError::Failed { program, status });
    }

    Ok(())
}

/// Runs `cmd` to completion with inherited stdio.
pub(crate) fn status(cmd: &mut Command, program: &'static str) -> Result<ExitStatus, SshError> {
    tracing::debug!(?cmd, "running");
    cmd.status().map_err(|source| SshError::Spawn { program, source })
}

/// Runs `command` on `alias` through ssh.
///
/// # Errors
///
/// Returns an error if ssh cannot be started or exits unsuccessfully.
pub fn run(alias: &str, command: &str) -> Result<(), SshError> {
    check(Command::new("ssh").arg(alias).arg(command), "ssh")
}

/// Runs ssh with `args` attached to the terminal and returns its exit status.
///
/// # Errors
///
/// Returns an error if ssh cannot be started.
pub fn session<I, S>(args: I) -> Result<ExitStatus, SshError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    status(Command::new("ssh").args(args), "ssh")
}

/// Recursively copies local `sources` to the scp `destination`
/// (`user@host:path`).
///
/// Does nothing when there is nothing to copy.
///
/// # Errors
///
/// Returns an error if scp cannot be started or exits unsuccessfully.
pub fn copy<P: AsRef<Path>>(sources: &[P], destination: &str) -> Result<(), SshError> {
    if sources.is_empty() {
        tracing::debug!(destination, "nothing to copy");
        return Ok(());
    }

    let mut cmd = Command::new("scp");
    cmd.arg("-r");
    for source in sources {
        cmd.arg(source.as_ref());
    }
    cmd.arg(destination);

    check(&mut cmd, "scp")
}
