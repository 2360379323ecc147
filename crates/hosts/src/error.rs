use config::ConfigError;
use mount::MountError;
use ssh::SshError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// How an [`Error`] should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid local setup; fatal.
    Configuration,
    /// A path was looked up outside the mount root.
    NotMounted,
    /// A host could not be reached or a remote command failed.
    RemoteUnreachable,
    /// The alias is not in the registry.
    MissingHost,
    /// Local filesystem failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuration => "configuration error",
            Self::NotMounted => "not mounted",
            Self::RemoteUnreachable => "remote unreachable",
            Self::MissingHost => "missing host",
            Self::Io => "I/O error",
        })
    }
}

/// Error type for host operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Inconsistent host definitions, such as a relay cycle.
    #[error("{0}")]
    Configuration(String),

    #[error("{} is not inside the mounts directory ({})", .path.display(), .root.display())]
    NotMounted { path: PathBuf, root: PathBuf },

    #[error("could not reach {alias}: {source}")]
    RemoteUnreachable { alias: String, source: SshError },

    #[error("host '{0}' doesn't exist. Use `clu setuphost` if you want to set up a new host")]
    MissingHost(String),

    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Ssh(SshError),

    #[error(transparent)]
    Mount(MountError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn unreachable(alias: &str) -> impl FnOnce(SshError) -> Self {
        let alias = alias.to_string();
        move |source| Self::RemoteUnreachable { alias, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::NotMounted { .. } => ErrorKind::NotMounted,
            Self::RemoteUnreachable { .. } => ErrorKind::RemoteUnreachable,
            Self::MissingHost(_) => ErrorKind::MissingHost,
            Self::Config(e) => config_kind(e),
            Self::Ssh(e) => match e {
                SshError::Io(_) => ErrorKind::Io,
                SshError::Parse(_) | SshError::MissingKey(_) => ErrorKind::Configuration,
                SshError::Spawn { .. } | SshError::Failed { .. } => ErrorKind::RemoteUnreachable,
            },
            Self::Mount(e) => match e {
                MountError::Config(e) => config_kind(e),
                MountError::NotADirectory(_) | MountError::NoAlias => ErrorKind::Configuration,
                MountError::NotMounted { .. } => ErrorKind::NotMounted,
                MountError::Spawn { .. } | MountError::Failed { .. } => {
                    ErrorKind::RemoteUnreachable
                }
                MountError::Io(_) => ErrorKind::Io,
            },
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

fn config_kind(error: &ConfigError) -> ErrorKind {
    match error {
        ConfigError::MissingHost(_) => ErrorKind::MissingHost,
        ConfigError::Io(_) | ConfigError::Prompt { .. } => ErrorKind::Io,
        ConfigError::NoHomeDir
        | ConfigError::MissingVariable(_)
        | ConfigError::Yaml(_)
        | ConfigError::Validation(_) => ErrorKind::Configuration,
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::MissingHost(alias) => Self::MissingHost(alias),
            error => Self::Config(error),
        }
    }
}

impl From<MountError> for Error {
    fn from(error: MountError) -> Self {
        match error {
            MountError::Config(error) => error.into(),
            MountError::NotMounted { path, root } => Self::NotMounted { path, root },
            error => Self::Mount(error),
        }
    }
}

impl From<SshError> for Error {
    fn from(error: SshError) -> Self {
        Self::Ssh(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_host_is_lifted() {
        let error = Error::from(ConfigError::MissingHost("gpu1".into()));
        assert!(matches!(&error, Error::MissingHost(alias) if alias == "gpu1"));
        assert_eq!(error.kind(), ErrorKind::MissingHost);

        let error = Error::from(MountError::Config(ConfigError::MissingHost("gpu1".into())));
        assert!(matches!(error, Error::MissingHost(_)));
    }

    #[test]
    fn test_not_mounted_is_lifted() {
        let error = Error::from(MountError::NotMounted {
            path: "/tmp".into(),
            root: "/mnt".into(),
        });
        assert!(matches!(error, Error::NotMounted { .. }));
        assert_eq!(error.kind(), ErrorKind::NotMounted);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::from(ConfigError::MissingVariable("CLUSTER_UTILS_MOUNTS")).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::from(MountError::NotADirectory("/mnt".into())).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::unreachable("gpu1")(SshError::Parse("bad".into())).kind(),
            ErrorKind::RemoteUnreachable
        );
        assert_eq!(
            Error::from(SshError::MissingKey("/home/alice/.ssh/id_rsa.pub".into())).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::Configuration("relay cycle".into()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::from(ConfigError::MissingHost("gpu1".into())).to_string(),
            "host 'gpu1' doesn't exist. Use `clu setuphost` if you want to set up a new host"
        );
        assert_eq!(ErrorKind::RemoteUnreachable.to_string(), "remote unreachable");
    }
}
