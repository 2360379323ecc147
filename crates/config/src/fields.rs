//! Host field schema and resolution of partially filled records.
//!
//! Fields are resolved in declaration order, so a default rule may read any
//! field declared before it.

use crate::error::ConfigError;
use crate::types::HostRecord;
use std::env;
use std::io;

/// Computes a field's default from the record resolved so far.
pub type DefaultRule = fn(&str, &HostRecord) -> Option<String>;

/// Answer that asks for the field description instead of setting a value.
pub const HELP: &str = "?";

/// The standard location of authorized keys on a host.
pub const DEFAULT_AUTH_KEYS: &str = "~/.ssh/authorized_keys";

/// One recognized host field.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<DefaultRule>,
}

impl Field {
    pub fn default_for(&self, record: &HostRecord) -> Option<String> {
        self.default.and_then(|rule| rule(self.name, record))
    }
}

/// Source of values for fields that have none.
pub trait Prompt {
    /// Asks for a value. An empty answer means "use the default".
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read.
    fn ask(&mut self, field: &Field, default: Option<&str>) -> io::Result<String>;

    /// Shows a progress or help line.
    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}

/// The fields of a host, in resolution order.
pub const HOST_FIELDS: &[Field] = &[
    Field {
        name: "host",
        description: "This is the alias that the host will have. It doesn't need to be the real name \
            of the computer. ssh commands will be able to understand this name. If you mount the \
            computer in your filesystem, it will be the name of the directory.",
        default: None,
    },
    Field {
        name: "user",
        description: "The user that will be used to log into the host. If you access the same \
            computer with multiple users, set up a different host for each one, maybe with a \
            suffix to tell them apart. You can always specify another user when you ssh into the \
            host, this is just the default one.",
        default: Some(login_user),
    },
    Field {
        name: "hostname",
        description: "The real address, or host name, that should be used to communicate with the host.",
        default: Some(same_as_host),
    },
    Field {
        name: "mount_hostname",
        description: "Some hosts have a dedicated address for large file transfers. If it's your \
            case, indicate it here.",
        default: Some(same_as_hostname),
    },
    Field {
        name: "mount_target",
        description: "The directory of the remote host that you want to be mounted into your \
            filesystem. Unless you have a good reason, this is the home directory (leave it empty).",
        default: Some(empty),
    },
    Field {
        name: "host_auth_keys",
        description: "The path to the file where the host keeps its authorized keys. The default \
            should be fine unless the cluster administrators use a non-standard location.",
        default: Some(standard_auth_keys),
    },
    Field {
        name: "clusterutils_dir",
        description: "The directory that clu will use to save scripts and commands in this host.",
        default: Some(home_clusterutils_dir),
    },
    Field {
        name: "jump_through",
        description: "The NAME OF THE HOST TO USE AS AN INTERMEDIATE STEP, when you can't ssh \
            directly to this host. If it is not a known host, it will be set up before finishing \
            with this one. You can chain as many jumps as you need, and a host can be used \
            normally and as a jump host at the same time.",
        default: Some(empty),
    },
];

fn login_user(_: &str, _: &HostRecord) -> Option<String> {
    current_user()
}

fn same_as_host(_: &str, record: &HostRecord) -> Option<String> {
    record.get("host").map(str::to_string)
}

fn same_as_hostname(_: &str, record: &HostRecord) -> Option<String> {
    record.get("hostname").map(str::to_string)
}

fn empty(_: &str, _: &HostRecord) -> Option<String> {
    Some(String::new())
}

fn standard_auth_keys(_: &str, _: &HostRecord) -> Option<String> {
    Some(DEFAULT_AUTH_KEYS.to_string())
}

fn home_clusterutils_dir(_: &str, _: &HostRecord) -> Option<String> {
    Some("~/.cluster-utils".to_string())
}

/// Looks up a field of [`HOST_FIELDS`] by name.
pub fn field(name: &str) -> Option<&'static Field> {
    HOST_FIELDS.iter().find(|f| f.name == name)
}

/// The login name of the current user, if the environment names one.
pub fn current_user() -> Option<String> {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .into_iter()
        .find_map(|var| env::var(var).ok().filter(|v| !v.is_empty()))
}

/// Resolves every field of `fields` for `record`.
///
/// With `use_defaults`, absent fields take their default without asking.
/// Fields that are still absent are asked for; answering [`HELP`] shows the
/// description and asks again, and an empty answer takes the default (or the
/// empty string). Fields already present are only echoed. Fields outside the
/// schema are carried through unchanged.
///
/// # Errors
///
/// Returns `ConfigError::Prompt` if the prompt fails.
pub fn resolve(
    fields: &[Field],
    mut record: HostRecord,
    prompt: &mut dyn Prompt,
    use_defaults: bool,
) -> Result<HostRecord, ConfigError> {
    prompt.say("Following, we will ask for the parameters of this host:");
    prompt.say("Enter '?' for a help message.");

    for field in fields {
        let default = field.default_for(&record);

        if use_defaults
            && !record.contains(field.name)
            && let Some(default) = &default
        {
            record.set(field.name, default.as_str());
        }

        if let Some(value) = record.get(field.name) {
            prompt.say(&format!(" - {}: {value}", field.name));
            continue;
        }

        let answer = loop {
            let answer = prompt
                .ask(field, default.as_deref())
                .map_err(|source| ConfigError::Prompt {
                    field: field.name.to_string(),
                    source,
                })?;

            if answer.trim() == HELP {
                prompt.say(&format!("\t({})", field.description));
                continue;
            }
            break answer;
        };

        let value = if answer.is_empty() {
            default.unwrap_or_default()
        } else {
            answer
        };
        record.set(field.name, value);
    }

    Ok(record)
}
