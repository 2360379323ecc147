//! Deployment of the script bundle to a host.

use crate::error::Error;
use config::{HostRecord, Paths, field};
use mount::mount_address;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level bundle files copied into the host's scripts directory.
pub const BUNDLE: [&str; 3] = ["activate", "install", "uninstall"];

const SCRIPTS: &str = "scripts";

/// Directories whose entries end up in `<dir>/scripts` on `alias`.
///
/// Later candidates win when two of them provide the same file.
pub fn script_candidates(paths: &Paths, alias: &str) -> Vec<PathBuf> {
    let scripts = paths.get(SCRIPTS);
    let user = paths.user_scripts.as_deref();

    let mut candidates = vec![scripts.join("generic")];
    candidates.extend(user.map(|u| u.join("generic")));
    candidates.push(scripts.join("host-specific").join(alias));
    candidates.extend(user.map(|u| u.join("host-specific").join(alias)));
    candidates
}

/// The entries of every existing candidate, in copy order.
///
/// # Errors
///
/// Returns an error if a candidate directory cannot be listed.
pub fn collect_scripts(candidates: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
    let mut scripts = Vec::new();

    for dir in candidates.iter().filter(|dir| dir.is_dir()) {
        let mut entries = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        scripts.extend(entries);
    }

    Ok(scripts)
}

/// Remote command that uninstalls a previous bundle and clears it.
pub fn prepare_command(dir: &str) -> String {
    format!(
        "if [ -f {dir}/.installed ]; then {dir}/uninstall > /dev/null; fi; \
         if [ -d {dir} ]; then rm -rf {dir}/{{{files},{SCRIPTS}}}; fi; \
         mkdir -p {dir}/{SCRIPTS}",
        files = BUNDLE.join(",")
    )
}

/// Remote command that runs the installer unless already installed.
pub fn install_command(dir: &str) -> String {
    format!("if [ ! -f {dir}/.installed ]; then {dir}/install; fi")
}

fn remote_dir(record: &HostRecord) -> String {
    record
        .non_empty("clusterutils_dir")
        .map(str::to_string)
        .or_else(|| field("clusterutils_dir").and_then(|f| f.default_for(record)))
        .unwrap_or_default()
}

/// Refreshes the script bundle on the host of `record`.
///
/// # Errors
///
/// Returns `Error::RemoteUnreachable` if a remote step fails.
pub fn setup_host_scripts(paths: &Paths, record: &HostRecord) -> Result<(), Error> {
    let alias = record
        .alias()
        .ok_or_else(|| Error::Configuration("host record has no alias".to_string()))?;
    let dir = remote_dir(record);
    let unreachable = |e: ssh::SshError| Error::unreachable(alias)(e);

    println!("Setting up scripts in {alias}:{dir}");
    ssh::run(alias, &prepare_command(&dir)).map_err(unreachable)?;

    let destination = mount_address(record, Some(&dir));
    ssh::copy(&bundle_files(&paths.root), &destination).map_err(unreachable)?;

    let scripts = collect_scripts(&script_candidates(paths, alias))?;
    ssh::copy(&scripts, &format!("{destination}/{SCRIPTS}")).map_err(unreachable)?;

    ssh::run(alias, &install_command(&dir)).map_err(unreachable)?;

    tracing::info!(alias, dir, "scripts installed");
    Ok(())
}

fn bundle_files(root: &Path) -> Vec<PathBuf> {
    BUNDLE
        .iter()
        .map(|name| root.join(name))
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                tracing::warn!(path = %path.display(), "bundle file missing, not copied");
            }
            exists
        })
        .collect()
}
