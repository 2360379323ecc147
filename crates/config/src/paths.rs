use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Variable naming the tool root.
pub const ROOT_VAR: &str = "CLUSTER_UTILS_ROOT";
/// Variable naming the mount root.
pub const MOUNTS_VAR: &str = "CLUSTER_UTILS_MOUNTS";
/// Variable naming the user scripts tree.
pub const USER_SCRIPTS_VAR: &str = "CLUSTER_UTILS_USERSCRIPTS";

const REGISTRY_FILE: &str = "hosts.yaml";

/// Local locations used by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Tool root: registry file and script bundle.
    pub root: PathBuf,
    /// Local SSH directory holding `config` and the key pairs.
    pub ssh_dir: PathBuf,
    /// Directory under which every host gets its mountpoint.
    pub mounts: Option<PathBuf>,
    /// Optional tree of user scripts.
    pub user_scripts: Option<PathBuf>,
}

impl Paths {
    /// Builds paths from optional overrides, falling back to locations under
    /// the home directory. Every path has a leading `~` expanded.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoHomeDir` if a fallback is needed and the home
    /// directory cannot be determined.
    pub fn resolve(
        root: Option<PathBuf>,
        mounts: Option<PathBuf>,
        user_scripts: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let home = dirs::home_dir();

        let root = match root {
            Some(root) => expand_tilde(&root),
            None => home.as_ref().ok_or(ConfigError::NoHomeDir)?.join(".cluster-utils"),
        };
        let ssh_dir = home.ok_or(ConfigError::NoHomeDir)?.join(".ssh");

        Ok(Self {
            root,
            ssh_dir,
            mounts: mounts.map(|p| expand_tilde(&p)),
            user_scripts: user_scripts.map(|p| expand_tilde(&p)),
        })
    }

    /// A path under the tool root.
    pub fn get(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// The host registry file.
    pub fn registry_file(&self) -> PathBuf {
        self.get(REGISTRY_FILE)
    }

    /// The SSH client configuration file.
    pub fn ssh_config(&self) -> PathBuf {
        self.ssh_dir.join("config")
    }

    /// The mount root.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingVariable` if no mount root is configured.
    pub fn mount_root(&self) -> Result<&Path, ConfigError> {
        self.mounts
            .as_deref()
            .ok_or(ConfigError::MissingVariable(MOUNTS_VAR))
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_paths_are_kept() {
        let paths = Paths::resolve(
            Some(PathBuf::from("/opt/clu")),
            Some(PathBuf::from("/mnt/clu")),
            None,
        )
        .unwrap();

        assert_eq!(paths.registry_file(), PathBuf::from("/opt/clu/hosts.yaml"));
        assert_eq!(paths.mount_root().unwrap(), Path::new("/mnt/clu"));
        assert!(paths.user_scripts.is_none());
    }

    #[test]
    fn test_missing_mount_root() {
        let paths = Paths::resolve(Some(PathBuf::from("/opt/clu")), None, None).unwrap();
        assert!(matches!(
            paths.mount_root(),
            Err(ConfigError::MissingVariable(MOUNTS_VAR))
        ));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/mnt")), home.join("mnt"));
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
    }

    #[test]
    fn test_ssh_config_under_ssh_dir() {
        let paths = Paths {
            root: PathBuf::from("/opt/clu"),
            ssh_dir: PathBuf::from("/home/alice/.ssh"),
            mounts: None,
            user_scripts: None,
        };
        assert_eq!(paths.ssh_config(), PathBuf::from("/home/alice/.ssh/config"));
        assert_eq!(paths.get("scripts"), PathBuf::from("/opt/clu/scripts"));
    }
}
