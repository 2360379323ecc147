use clap::{Args, Parser, Subcommand};
use config::{HostRecord, MOUNTS_VAR, ROOT_VAR, USER_SCRIPTS_VAR};
use hosts::{SetupOptions, Target};
use ssh::KeyOptions;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clu", version = crate::VERSION, about = "Helpers to work with remote clusters")]
pub struct Arguments {
    /// Tool root holding the host registry and the script bundle.
    #[arg(long, global = true, env = ROOT_VAR)]
    pub root: Option<PathBuf>,

    /// Directory where hosts are mounted.
    #[arg(long, global = true, env = MOUNTS_VAR)]
    pub mounts: Option<PathBuf>,

    /// Directory with your own scripts.
    #[arg(long, global = true, env = USER_SCRIPTS_VAR)]
    pub user_scripts: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints the hosts known by cluster-utils.
    #[command(name = "lshosts")]
    LsHosts,

    /// Sends the SSH key of this computer to the hosts, creating it if needed.
    #[command(name = "sendkeys")]
    SendKeys {
        #[command(flatten)]
        targets: Targets,
        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Sets up new hosts, interactively or from YAML files.
    #[command(name = "setuphost")]
    SetupHost {
        /// Registry-like YAML files with the hosts to set up.
        #[arg(long, num_args = 0..)]
        config: Vec<PathBuf>,
        #[command(flatten)]
        fields: HostFields,
        #[command(flatten)]
        setup: SetupArgs,
    },

    /// Forgets hosts: unmounts them and removes their SSH config.
    #[command(name = "removehost")]
    RemoveHost {
        #[command(flatten)]
        targets: Targets,
    },

    /// Sets up hosts again with some values changed.
    #[command(name = "updatehostconfig")]
    UpdateHostConfig {
        #[command(flatten)]
        targets: Targets,
        #[command(flatten)]
        fields: HostFields,
        #[command(flatten)]
        setup: SetupArgs,
    },

    /// Refreshes the cluster-utils scripts on the hosts.
    #[command(name = "setuphostscripts")]
    SetupHostScripts {
        #[command(flatten)]
        targets: Targets,
    },

    /// Prints the mounted hosts.
    #[command(name = "lsmounts")]
    LsMounts,

    /// Mounts hosts into the mounts directory.
    Mount {
        #[command(flatten)]
        targets: Targets,
        /// Additional options for sshfs.
        #[arg(last = true, allow_hyphen_values = true)]
        options: Vec<String>,
    },

    /// Unmounts hosts. `--all` unmounts every mounted host.
    Unmount {
        #[command(flatten)]
        targets: Targets,
    },

    /// Opens a shell, or runs a command, in the remote equivalent of the
    /// current directory.
    #[command(after_help = "Example: 'clu fssh make -j4' runs 'make -j4' in the equivalent REMOTE folder.")]
    Fssh {
        /// Command to run. Without it, you get a terminal in the remote directory.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Runs jupyter notebook on a host and forwards its port here.
    #[command(name = "remotejupyternb")]
    RemoteJupyterNb {
        /// Host to run on. Inferred from the current directory if not given.
        host: Option<String>,
        /// Port for the notebook, here and on the host.
        #[arg(short, long, default_value_t = 8003)]
        port: u16,
        /// Where to run jupyter. Taken as is when a host is given, otherwise a
        /// local path inside a mountpoint.
        #[arg(long, default_value = "")]
        path: String,
    },

    /// Prints a path under the cluster-utils root.
    Path { path: Option<PathBuf> },
}

/// Hosts a command applies to.
#[derive(Args, Debug)]
pub struct Targets {
    /// The name(s) of the host(s), as understood by ssh (and cluster-utils).
    #[arg(value_name = "H")]
    pub hosts: Vec<String>,

    /// Repeat the command for every host.
    #[arg(long)]
    pub all: bool,
}

impl Targets {
    pub fn target(&self) -> Target {
        Target::new(self.hosts.clone(), self.all)
    }
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Key algorithm, as understood by ssh-keygen.
    #[arg(short = 't', default_value = "rsa")]
    pub key_type: String,

    /// Key size for a new key.
    #[arg(short, long)]
    pub bits: Option<u32>,
}

impl KeyArgs {
    pub fn options(&self) -> KeyOptions {
        KeyOptions {
            key_type: self.key_type.clone(),
            bits: self.bits,
        }
    }
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Don't ask for fields that have a default.
    #[arg(long)]
    pub use_defaults: bool,

    /// Don't connect to the host: skip sending keys and installing scripts.
    #[arg(long)]
    pub no_conn: bool,

    #[command(flatten)]
    pub keys: KeyArgs,
}

impl SetupArgs {
    pub fn options(&self) -> SetupOptions {
        SetupOptions {
            use_defaults: self.use_defaults,
            skip_connection: self.no_conn,
            keys: self.keys.options(),
        }
    }
}

/// Explicit values for host fields.
#[derive(Args, Debug)]
pub struct HostFields {
    /// Alias of the host, also its mountpoint name.
    #[arg(long)]
    pub host: Option<String>,

    /// User to log in as.
    #[arg(long)]
    pub user: Option<String>,

    /// Real address of the host.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Address used for file transfers.
    #[arg(long, alias = "mount_hostname")]
    pub mount_hostname: Option<String>,

    /// Remote directory to mount (empty for home).
    #[arg(long, alias = "mount_target")]
    pub mount_target: Option<String>,

    /// Authorized keys file on the host.
    #[arg(long, alias = "host_auth_keys")]
    pub host_auth_keys: Option<String>,

    /// Directory for cluster-utils scripts on the host.
    #[arg(long, alias = "clusterutils_dir")]
    pub clusterutils_dir: Option<String>,

    /// Host to jump through to reach this one.
    #[arg(long, alias = "jump_through")]
    pub jump_through: Option<String>,
}

impl HostFields {
    /// The given fields, keyed by field name.
    pub fn to_record(&self) -> HostRecord {
        [
            ("host", &self.host),
            ("user", &self.user),
            ("hostname", &self.hostname),
            ("mount_hostname", &self.mount_hostname),
            ("mount_target", &self.mount_target),
            ("host_auth_keys", &self.host_auth_keys),
            ("clusterutils_dir", &self.clusterutils_dir),
            ("jump_through", &self.jump_through),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.clone().map(|v| (name, v)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Arguments {
        Arguments::try_parse_from(std::iter::once("clu").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_is_consistent() {
        Arguments::command().debug_assert();
    }

    #[test]
    fn test_field_flags_cover_every_field() {
        let names: Vec<_> = config::HOST_FIELDS.iter().map(|f| f.name).collect();
        let Command::SetupHost { fields, .. } = parse(&[
            "setuphost",
            "--host",
            "h",
            "--user",
            "u",
            "--hostname",
            "hn",
            "--mount-hostname",
            "mh",
            "--mount_target",
            "/t",
            "--host-auth-keys",
            "k",
            "--clusterutils-dir",
            "d",
            "--jump-through",
            "j",
        ])
        .command
        else {
            panic!("expected setuphost");
        };

        let record = fields.to_record();
        assert_eq!(record.len(), names.len());
        assert!(names.iter().all(|name| record.contains(name)));
        assert_eq!(record.get("mount_target"), Some("/t"));
    }

    #[test]
    fn test_mount_extra_options() {
        let Command::Mount { targets, options } =
            parse(&["mount", "gpu1", "login", "--", "-o", "reconnect"]).command
        else {
            panic!("expected mount");
        };
        assert_eq!(targets.target(), Target::Hosts(vec!["gpu1".into(), "login".into()]));
        assert_eq!(options, ["-o", "reconnect"]);
    }

    #[test]
    fn test_all_flag() {
        let Command::Unmount { targets } = parse(&["unmount", "--all"]).command else {
            panic!("expected unmount");
        };
        assert_eq!(targets.target(), Target::All);
    }

    #[test]
    fn test_fssh_command() {
        let Command::Fssh { command } = parse(&["fssh", "ls", "-la"]).command else {
            panic!("expected fssh");
        };
        assert_eq!(command, ["ls", "-la"]);
    }

    #[test]
    fn test_setup_from_files() {
        let Command::SetupHost { config, setup, .. } =
            parse(&["setuphost", "--config", "a.yaml", "b.yaml", "--use-defaults", "--no-conn"])
                .command
        else {
            panic!("expected setuphost");
        };
        assert_eq!(config, [PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]);
        let options = setup.options();
        assert!(options.use_defaults && options.skip_connection);
        assert_eq!(options.keys, KeyOptions::default());
    }
}
