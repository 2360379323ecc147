use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Error type for SSH config edits and ssh/scp invocations.
#[derive(Error, Debug)]
pub enum SshError {
    /// Local file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// SSH config exists but could not be parsed.
    #[error("failed to parse SSH config: {0}")]
    Parse(String),

    /// An external program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        source: io::Error,
    },

    /// An external program exited unsuccessfully.
    #[error("{program} exited with {status}")]
    Failed {
        program: &'static str,
        status: ExitStatus,
    },

    /// The public key is still missing after trying to generate it.
    #[error("no public key found at {}", .0.display())]
    MissingKey(PathBuf),
}
