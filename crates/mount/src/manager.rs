use crate::error::MountError;
use crate::guard::{is_mount_point, lock, unlock};
use crate::unmount_command;
use config::{HostRecord, Paths, Registry, current_user};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

/// Options always passed to sshfs, before any caller-supplied ones.
pub const SSHFS_OPTIONS: &str =
    "ServerAliveInterval=5,ServerAliveCountMax=2,ConnectTimeout=3,ConnectionAttempts=1";

/// Returns `user@mount_hostname`, followed by `:target` when given.
pub fn mount_address(record: &HostRecord, target: Option<&str>) -> String {
    let user = record
        .get("user")
        .map(str::to_string)
        .or_else(current_user)
        .unwrap_or_default();
    let hostname = record
        .get("mount_hostname")
        .or_else(|| record.alias())
        .unwrap_or_default();

    match target {
        Some(target) => format!("{user}@{hostname}:{target}"),
        None => format!("{user}@{hostname}"),
    }
}

/// Per-host mountpoints under a single mount root.
#[derive(Debug, Clone)]
pub struct MountManager {
    root: PathBuf,
}

impl MountManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Uses the configured mount root.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no mount root is configured.
    pub fn from_paths(paths: &Paths) -> Result<Self, MountError> {
        Ok(Self::new(paths.mount_root()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mount_point(&self, alias: &str) -> PathBuf {
        self.root.join(alias)
    }

    pub fn is_mounted(&self, alias: &str) -> bool {
        is_mount_point(&self.mount_point(alias))
    }

    /// Aliases currently mounted, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount root cannot be listed.
    pub fn mounted(&self) -> Result<Vec<String>, MountError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut mounted = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if is_mount_point(&entry.path()) {
                mounted.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        mounted.sort();
        Ok(mounted)
    }

    /// Creates the mountpoint of `alias` if needed and leaves the mount root
    /// locked.
    ///
    /// # Errors
    ///
    /// Returns `MountError::NotADirectory` if the mount root is a file, or an
    /// I/O error if the directories cannot be created.
    pub fn prepare(&self, alias: &str) -> Result<PathBuf, MountError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        } else if !self.root.is_dir() {
            return Err(MountError::NotADirectory(self.root.clone()));
        }

        let mount_point = self.mount_point(alias);
        if !mount_point.exists() {
            unlock(&self.root)?;
            let created = fs::create_dir(&mount_point);
            lock(&self.root)?;
            created?;
            tracing::debug!(path = %mount_point.display(), "created mountpoint");
        }

        // Also covers mount roots created by hand before their first use.
        lock(&self.root)?;

        Ok(mount_point)
    }

    /// Mounts the remote target of `record` onto its mountpoint with sshfs.
    ///
    /// `extra` options are passed after the fixed ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the mountpoint cannot be prepared, sshfs cannot be
    /// started, or sshfs exits unsuccessfully.
    pub fn mount(&self, record: &HostRecord, extra: &[String]) -> Result<(), MountError> {
        let alias = record.alias().ok_or(MountError::NoAlias)?;
        let mount_point = self.prepare(alias)?;

        if is_mount_point(&mount_point) {
            println!("{alias} is already mounted");
            return Ok(());
        }

        let mut cmd = Command::new("sshfs");
        cmd.arg("-o")
            .arg(SSHFS_OPTIONS)
            .args(extra)
            .arg(mount_address(
                record,
                Some(record.get("mount_target").unwrap_or_default()),
            ))
            .arg(&mount_point);
        tracing::debug!(?cmd, "running");

        let status = cmd.status().map_err(|source| MountError::Spawn {
            program: "sshfs",
            source,
        })?;
        if !status.success() {
            return Err(MountError::Failed {
                alias: alias.to_string(),
                status,
            });
        }

        tracing::info!(alias, path = %mount_point.display(), "mounted");
        Ok(())
    }

    /// Unmounts `alias`.
    ///
    /// A failing unmount tool means there was nothing to unmount, and returns
    /// `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the unmount tool cannot be started.
    pub fn unmount(&self, alias: &str) -> Result<bool, MountError> {
        let mut cmd = unmount_command(&self.mount_point(alias));
        tracing::debug!(?cmd, "running");

        let program = if cfg!(target_os = "macos") {
            "umount"
        } else {
            "fusermount"
        };
        let status = cmd
            .status()
            .map_err(|source| MountError::Spawn { program, source })?;

        if status.success() {
            println!("Successfully unmounted {alias}");
            Ok(true)
        } else {
            tracing::debug!(alias, %status, "nothing to unmount");
            Ok(false)
        }
    }

    /// Unmounts `alias` if needed and deletes its mountpoint.
    ///
    /// The mount root is locked again afterwards unless it became empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the mountpoint cannot be removed, for instance
    /// because it is still mounted.
    pub fn remove_mount_point(&self, alias: &str) -> Result<(), MountError> {
        if self.is_mounted(alias) {
            self.unmount(alias)?;
        }

        let mount_point = self.mount_point(alias);
        let removed = if mount_point.is_dir() {
            unlock(&self.root)?;
            fs::remove_dir(&mount_point)
        } else {
            Ok(())
        };

        self.relock()?;

        removed?;
        tracing::debug!(path = %mount_point.display(), "removed mountpoint");
        Ok(())
    }

    /// Locks the mount root again unless it is gone or empty. A root that
    /// cannot be listed is locked.
    fn relock(&self) -> io::Result<()> {
        if !self.root.is_dir() {
            return Ok(());
        }

        match fs::read_dir(&self.root) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    Ok(())
                } else {
                    lock(&self.root)
                }
            }
            Err(e) => {
                tracing::debug!(path = %self.root.display(), error = %e, "cannot list mount root");
                lock(&self.root)
            }
        }
    }

    /// Maps a local path inside a mountpoint to its host and remote path.
    ///
    /// # Errors
    ///
    /// Returns `MountError::NotMounted` if `path` is not below a mountpoint,
    /// or a missing-host error if the mountpoint's host is unknown.
    pub fn path_to_host(
        &self,
        path: &Path,
        registry: &Registry,
    ) -> Result<(String, PathBuf), MountError> {
        let path = fs::canonicalize(path).or_else(|_| std::path::absolute(path))?;
        let root = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());

        let not_mounted = || MountError::NotMounted {
            path: path.clone(),
            root: root.clone(),
        };

        let relative = path.strip_prefix(&root).map_err(|_| not_mounted())?;
        let mut components = relative.components();
        let alias = match components.next() {
            Some(Component::Normal(alias)) => alias.to_string_lossy().into_owned(),
            _ => return Err(not_mounted()),
        };
        let rest = components.as_path();

        let record = registry.get(&alias)?;
        let remote_root = PathBuf::from(record.get("mount_target").unwrap_or_default());
        let remote = if rest.as_os_str().is_empty() {
            remote_root
        } else {
            remote_root.join(rest)
        };

        Ok((alias, remote))
    }
}
