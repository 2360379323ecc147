//! Adding, removing and regenerating hosts.
//!
//! Setup writes the registry entry and the SSH config block, then tries to
//! reach the host. Removal undoes the local state in the reverse order: mount,
//! SSH config block, registry entry.

use crate::error::{Error, ErrorKind};
use crate::scripts::setup_host_scripts;
use crate::targets::Report;
use config::{
    DEFAULT_AUTH_KEYS, HOST, HOST_FIELDS, HostRecord, Paths, Prompt, Registry, Store, load_many,
    resolve,
};
use mount::MountManager;
use ssh::{AuthorizedKeys, HostBlock, KeyOptions};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Field naming the relay host.
const JUMP_THROUGH: &str = "jump_through";

/// What to set up.
#[derive(Debug, Clone)]
pub enum Source {
    /// A single, possibly partial, record.
    Record(HostRecord),
    /// Several records keyed by alias.
    Registry(Registry),
    /// Registry files, merged with later files winning.
    Files(Vec<PathBuf>),
}

/// Flags shared by setup and update.
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Take defaults instead of asking for absent fields.
    pub use_defaults: bool,
    /// Only write local state; don't contact the host.
    pub skip_connection: bool,
    /// Key pair used for key distribution.
    pub keys: KeyOptions,
}

/// How far setup of one host got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Keys sent and scripts installed.
    Ready,
    /// Registered without contacting the host.
    Registered,
    /// Registered, but the keys could not be sent.
    KeysFailed,
    /// Registered with keys, but the scripts could not be installed.
    ScriptsFailed,
}

/// State of one setup call, shared across relay recursion.
struct Run<'a> {
    options: &'a SetupOptions,
    prompt: &'a mut dyn Prompt,
    batch: Registry,
    /// Relay chain being resolved, outermost host first.
    in_progress: Vec<String>,
    done: BTreeSet<String>,
}

impl<'a> Run<'a> {
    fn new(options: &'a SetupOptions, prompt: &'a mut dyn Prompt, batch: Registry) -> Self {
        Self {
            options,
            prompt,
            batch,
            in_progress: Vec::new(),
            done: BTreeSet::new(),
        }
    }
}

/// Host lifecycle operations over one set of [`Paths`].
#[derive(Debug, Clone)]
pub struct HostManager {
    paths: Paths,
    store: Store,
}

impl HostManager {
    pub fn new(paths: Paths) -> Self {
        let store = Store::new(paths.registry_file());
        Self { paths, store }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Known aliases, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub fn aliases(&self) -> Result<Vec<String>, Error> {
        Ok(self.store.hosts()?.aliases())
    }

    /// The mount manager for the configured mount root.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no mount root is configured.
    pub fn mounts(&self) -> Result<MountManager, Error> {
        Ok(MountManager::from_paths(&self.paths)?)
    }

    /// The host and remote path behind a local path inside a mountpoint.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotMounted` if `path` is outside the mount root and
    /// `Error::MissingHost` if its mountpoint belongs to no known host.
    pub fn path_to_host(&self, path: &Path) -> Result<(String, PathBuf), Error> {
        let registry = self.store.hosts()?;
        Ok(self.mounts()?.path_to_host(path, &registry)?)
    }

    /// Sets up every host of `source`.
    ///
    /// `overrides` replace the matching fields of every record of `source`.
    /// Relays that are not yet known are set up first, from their entry in
    /// `source` when it has one, and are not set up a second time. Each
    /// top-level entry is reported separately.
    ///
    /// # Errors
    ///
    /// Returns an error only if `source` files cannot be loaded.
    pub fn setup(
        &self,
        source: Source,
        overrides: &HostRecord,
        options: &SetupOptions,
        prompt: &mut dyn Prompt,
    ) -> Result<Report<SetupOutcome>, Error> {
        let batch = match source {
            Source::Record(mut record) => {
                record.merge(overrides);
                let mut run = Run::new(options, prompt, Registry::new());
                let name = record.alias().unwrap_or("new host").to_string();

                let mut report = Report::default();
                report.push(name, self.setup_record(&mut run, record));
                return Ok(report);
            }
            Source::Registry(registry) => registry,
            Source::Files(files) => load_many(&files)?,
        };

        let batch: Registry = batch
            .into_iter()
            .map(|(name, mut record)| {
                if !record.contains(HOST) {
                    record.set(HOST, name.as_str());
                }
                record.merge(overrides);
                (name, record)
            })
            .collect();

        let mut run = Run::new(options, prompt, batch.clone());
        let mut report = Report::default();
        for (name, record) in batch {
            if run.done.contains(&name) {
                tracing::debug!(alias = name, "already set up as a relay");
                continue;
            }

            run.in_progress.clear();
            let result = self.setup_record(&mut run, record);
            report.push(name, result);
        }

        Ok(report)
    }

    fn setup_record(&self, run: &mut Run<'_>, record: HostRecord) -> Result<SetupOutcome, Error> {
        let record = resolve(HOST_FIELDS, record, &mut *run.prompt, run.options.use_defaults)?;
        let alias = record.get(HOST).unwrap_or_default().to_string();
        check_alias(&alias)?;

        if run.in_progress.contains(&alias) {
            run.in_progress.push(alias);
            return Err(Error::Configuration(format!(
                "relay cycle: {}",
                run.in_progress.join(" -> ")
            )));
        }
        run.in_progress.push(alias.clone());

        if let Some(relay) = record.non_empty(JUMP_THROUGH) {
            self.ensure_relay(run, relay)?;
        }

        self.write_ssh_block(&record)?;

        let mut entry = Registry::new();
        entry.insert(alias.clone(), record.clone());
        self.store.add_hosts(entry)?;
        tracing::info!(alias, "host registered");

        run.in_progress.pop();
        run.done.insert(alias.clone());

        if run.options.skip_connection {
            return Ok(SetupOutcome::Registered);
        }

        self.connect(&record, &alias, &run.options.keys)
    }

    fn ensure_relay(&self, run: &mut Run<'_>, relay: &str) -> Result<(), Error> {
        if run.in_progress.iter().any(|a| a == relay) {
            let chain = run.in_progress.join(" -> ");
            return Err(Error::Configuration(format!(
                "relay cycle: {chain} -> {relay}"
            )));
        }
        if run.done.contains(relay) || self.store.hosts()?.contains(relay) {
            return Ok(());
        }

        println!("{relay} is not a known host, setting it up first");
        let mut record = run.batch.get(relay).ok().cloned().unwrap_or_default();
        if !record.contains(HOST) {
            record.set(HOST, relay);
        }

        self.setup_record(run, record).map(|_| ())
    }

    /// Appends the SSH block for `record`, replacing one left by an earlier
    /// setup. A hand-written block for the same alias is kept.
    fn write_ssh_block(&self, record: &HostRecord) -> Result<(), Error> {
        let ssh_config = self.paths.ssh_config();
        let alias = record.alias().unwrap_or_default();

        match ssh::declared_hosts(&ssh_config) {
            Ok(declared) if declared.iter().any(|h| h == alias) => {
                let content = fs::read_to_string(&ssh_config)?;
                let existing = ssh::block_lines(&content, alias);
                if existing.is_empty() {
                    tracing::debug!(alias, "alias only declared in a multi-pattern block");
                } else if ssh::is_written_block(&existing) {
                    tracing::warn!(alias, "replacing existing SSH config block");
                    ssh::remove_block(&ssh_config, alias)?;
                } else {
                    tracing::warn!(
                        alias,
                        lines = ?existing,
                        "keeping hand-written SSH config block, the new one is appended after it"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "could not inspect SSH config"),
        }

        let block = HostBlock {
            alias: alias.to_string(),
            user: record.get("user").unwrap_or_default().to_string(),
            hostname: record.non_empty("hostname").unwrap_or(alias).to_string(),
            proxy_jump: record.non_empty(JUMP_THROUGH).map(str::to_string),
        };
        ssh::append_block(&ssh_config, &block)?;
        tracing::debug!(alias, path = %ssh_config.display(), "SSH config block written");

        Ok(())
    }

    /// Sends keys, then installs scripts. Failures leave the host registered
    /// and tell the user how to finish by hand.
    fn connect(
        &self,
        record: &HostRecord,
        alias: &str,
        keys: &KeyOptions,
    ) -> Result<SetupOutcome, Error> {
        if let Err(e) = self.send_keys(alias, keys) {
            tracing::warn!(alias, error = %e, "key distribution failed");
            println!(
                "(cluster-utils) WE COULD NOT SEND THE KEYS ({e}). Therefore we will not try to \
                 setup scripts in the host."
            );
            println!(" When there is connection, you can try again:");
            println!("     clu sendkeys {alias}");
            println!("     clu setuphostscripts {alias}");
            return Ok(SetupOutcome::KeysFailed);
        }

        scripts_outcome(alias, setup_host_scripts(&self.paths, record))
    }

    /// Installs the local public key on `alias`, generating the pair first
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingHost` for unknown aliases, a configuration error
    /// if no key could be generated, and `Error::RemoteUnreachable` if the
    /// transfer fails.
    pub fn send_keys(&self, alias: &str, keys: &KeyOptions) -> Result<(), Error> {
        let record = self.store.host(alias)?;
        let public_key = ssh::ensure_key(&self.paths.ssh_dir, keys)?;

        let auth_keys = record.non_empty("host_auth_keys").unwrap_or(DEFAULT_AUTH_KEYS);
        let target = if auth_keys == DEFAULT_AUTH_KEYS {
            AuthorizedKeys::Standard
        } else {
            AuthorizedKeys::File(auth_keys)
        };

        ssh::send_key(alias, &public_key, target).map_err(Error::unreachable(alias))?;
        println!("Keys sent to {alias}");
        Ok(())
    }

    /// Reinstalls the script bundle on a known host.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingHost` for unknown aliases and
    /// `Error::RemoteUnreachable` if a remote step fails.
    pub fn setup_scripts(&self, alias: &str) -> Result<(), Error> {
        let record = self.store.host(alias)?;
        setup_host_scripts(&self.paths, &record)
    }

    /// Removes the mountpoint and SSH config block of `alias`, keeping its
    /// registry entry.
    fn detach(&self, alias: &str) -> Result<(), Error> {
        self.mounts()?.remove_mount_point(alias)?;
        ssh::remove_block(&self.paths.ssh_config(), alias)?;
        Ok(())
    }

    /// Forgets `alias`: mountpoint first, then SSH config block, then the
    /// registry entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingHost` before touching anything if the alias is
    /// unknown.
    pub fn remove(&self, alias: &str) -> Result<(), Error> {
        self.store.host(alias)?;

        self.detach(alias)?;
        self.store.remove_hosts(&[alias])?;

        println!("Removed {alias}");
        Ok(())
    }

    /// Regenerates `alias` from its stored record merged with `overrides`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingHost` before touching anything if the alias is
    /// unknown, and a configuration error if `overrides` renames the host.
    pub fn update(
        &self,
        alias: &str,
        overrides: &HostRecord,
        options: &SetupOptions,
        prompt: &mut dyn Prompt,
    ) -> Result<SetupOutcome, Error> {
        let mut record = self.store.host(alias)?;
        if let Some(host) = overrides.get(HOST)
            && host != alias
        {
            return Err(Error::Configuration(format!(
                "cannot rename {alias} to {host}; remove it and set it up again"
            )));
        }

        self.detach(alias)?;
        record.merge(overrides);

        let mut run = Run::new(options, prompt, Registry::new());
        self.setup_record(&mut run, record)
    }
}

/// Script sync failures that only need a retry leave the host usable.
fn scripts_outcome(alias: &str, result: Result<(), Error>) -> Result<SetupOutcome, Error> {
    match result {
        Ok(()) => Ok(SetupOutcome::Ready),
        Err(e) if e.kind() == ErrorKind::RemoteUnreachable => {
            tracing::warn!(alias, error = %e, "script setup failed");
            println!("(cluster-utils) WE COULD NOT SET UP THE SCRIPTS ({e}).");
            println!(" When there is connection, you can try again:");
            println!("     clu setuphostscripts {alias}");
            Ok(SetupOutcome::ScriptsFailed)
        }
        Err(e) => Err(e),
    }
}

/// Accepts aliases usable both as an SSH host pattern and a mountpoint name.
fn check_alias(alias: &str) -> Result<(), Error> {
    if alias.is_empty() {
        return Err(Error::Configuration(
            "the host alias must not be empty".to_string(),
        ));
    }

    let mut components = Path::new(alias).components();
    let single = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if single && !alias.contains(['/', '*', '?', '!']) && !alias.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "invalid host alias {alias:?}: use a single name without spaces, slashes or wildcards"
        )))
    }
}
