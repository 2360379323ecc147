//! Distribution of the local public key to hosts.

use crate::error::SshError;
use crate::remote::{check, status};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// Key pair selection for `ssh-keygen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOptions {
    /// Algorithm, as understood by `ssh-keygen -t`.
    pub key_type: String,
    /// Key size; a per-algorithm default is used when absent.
    pub bits: Option<u32>,
}

impl Default for KeyOptions {
    fn default() -> Self {
        Self {
            key_type: "rsa".to_string(),
            bits: None,
        }
    }
}

impl KeyOptions {
    /// Key size passed to `ssh-keygen -b`, if any.
    pub fn bits(&self) -> Option<u32> {
        self.bits.or(match self.key_type.as_str() {
            "rsa" => Some(4096),
            "ecdsa" => Some(521),
            _ => None,
        })
    }

    /// The public key file in `ssh_dir`.
    pub fn public_key(&self, ssh_dir: &Path) -> PathBuf {
        ssh_dir.join(format!("id_{}.pub", self.key_type))
    }
}

/// Where the host keeps authorized keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizedKeys<'a> {
    /// `~/.ssh/authorized_keys`, which `ssh-copy-id` knows how to fill.
    Standard,
    /// Any other file on the host.
    File(&'a str),
}

/// Returns the public key, generating the pair with `ssh-keygen` if needed.
///
/// # Errors
///
/// Returns `SshError::MissingKey` if the key still doesn't exist afterwards.
pub fn ensure_key(ssh_dir: &Path, options: &KeyOptions) -> Result<PathBuf, SshError> {
    let public_key = options.public_key(ssh_dir);
    if public_key.exists() {
        return Ok(public_key);
    }

    tracing::info!(key = %public_key.display(), "generating a new key pair");
    let mut cmd = Command::new("ssh-keygen");
    cmd.arg("-t").arg(&options.key_type);
    if let Some(bits) = options.bits() {
        cmd.arg("-b").arg(bits.to_string());
    }
    cmd.arg("-f").arg(public_key.with_extension(""));
    // The user may cancel; the existence check below tells.
    let status = status(&mut cmd, "ssh-keygen")?;
    tracing::debug!(%status, "ssh-keygen finished");

    if public_key.exists() {
        Ok(public_key)
    } else {
        Err(SshError::MissingKey(public_key))
    }
}

/// Installs `public_key` as an authorized key of `alias`.
///
/// Uses `ssh-copy-id` for the standard location when it is installed, and
/// appends the key through ssh otherwise.
///
/// # Errors
///
/// Returns an error if the key cannot be read or the transfer fails.
pub fn send_key(
    alias: &str,
    public_key: &Path,
    authorized_keys: AuthorizedKeys<'_>,
) -> Result<(), SshError> {
    match authorized_keys {
        AuthorizedKeys::Standard if which::which("ssh-copy-id").is_ok() => check(
            Command::new("ssh-copy-id")
                .arg("-i")
                .arg(public_key)
                .arg(alias),
            "ssh-copy-id",
        ),
        AuthorizedKeys::Standard => append_key(alias, public_key, "~/.ssh/authorized_keys"),
        AuthorizedKeys::File(path) => append_key(alias, public_key, path),
    }
}

fn append_key(alias: &str, public_key: &Path, authorized_keys: &str) -> Result<(), SshError> {
    let key = fs::read(public_key)?;

    let mut cmd = Command::new("ssh");
    cmd.arg(alias)
        .arg(format!("cat >> {authorized_keys}"))
        .stdin(Stdio::piped());
    tracing::debug!(?cmd, "running");

    let child = cmd.spawn().map_err(|source| SshError::Spawn {
        program: "ssh",
        source,
    })?;

    let status = feed(child, &key)?;
    if status.success() {
        Ok(())
    } else {
        Err(SshError::Failed {
            program: "ssh",
            status,
        })
    }
}

/// Writes `input` to the child's stdin, then waits for it.
///
/// The child is reaped even when the write fails.
fn feed(mut child: Child, input: &[u8]) -> Result<ExitStatus, SshError> {
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(input),
        None => Ok(()),
    };

    let status = child.wait()?;
    written?;
    Ok(status)
}
