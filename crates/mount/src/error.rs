use config::ConfigError;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Error type for mountpoint operations.
#[derive(Error, Debug)]
pub enum MountError {
    /// Missing configuration or unknown host.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The mount root exists but is not a directory.
    #[error("the mounts directory is set to {}, which is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// A path was expected inside a mountpoint.
    #[error("{} is not inside the mounts directory ({})", .path.display(), .root.display())]
    NotMounted { path: PathBuf, root: PathBuf },

    /// The record has no alias to name its mountpoint after.
    #[error("host record has no alias")]
    NoAlias,

    /// An external program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        source: io::Error,
    },

    /// sshfs exited unsuccessfully.
    #[error("sshfs exited with {status} while mounting {alias}")]
    Failed { alias: String, status: ExitStatus },

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
