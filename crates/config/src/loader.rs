use crate::error::ConfigError;
use crate::schema::{ValidationError, ValidationResult, validate};
use crate::types::{HOST, HostRecord, Registry};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads a registry from a YAML string.
///
/// An empty or `null` document is an empty registry.
///
/// # Errors
///
/// Returns an error if the YAML is invalid or fails schema validation.
pub fn load_from_str(s: &str) -> Result<Registry, ConfigError> {
    s.parse()
}

/// Loads a registry from a specific path.
///
/// A missing file is an empty registry.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the registry is invalid.
pub fn load_from_path(path: &Path) -> Result<Registry, ConfigError> {
    if !path.is_file() {
        return Ok(Registry::default());
    }

    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Loads several registry files, later files replacing earlier entries.
///
/// Entries without a `host` field get their key as alias.
///
/// # Errors
///
/// Returns the first load error.
pub fn load_many<P: AsRef<Path>>(paths: &[P]) -> Result<Registry, ConfigError> {
    let mut registry = Registry::new();

    for path in paths {
        registry.extend(load_from_path(path.as_ref())?);
    }

    Ok(registry
        .into_iter()
        .map(|(alias, mut record)| {
            if !record.contains(HOST) {
                record.set(HOST, alias.as_str());
            }
            (alias, record)
        })
        .collect())
}

/// Writes a registry to `path` as YAML.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save_to_path(path: &Path, registry: &Registry) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(registry)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, yaml)?;
    tracing::debug!(path = %path.display(), hosts = registry.len(), "wrote host registry");
    Ok(())
}

impl FromStr for Registry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Registry::default());
        }

        let mut value: Value = serde_yaml::from_str(s)?;
        if value.is_null() {
            return Ok(Registry::default());
        }
        normalize(&mut value);

        if let ValidationResult::Invalid(errors) = validate(&value) {
            return Err(ConfigError::Validation(errors));
        }

        serde_json::from_value(value).map_err(|e| {
            ConfigError::Validation(vec![ValidationError {
                path: String::new(),
                message: e.to_string(),
            }])
        })
    }
}

/// Reads hand-edited scalars the way they were meant.
///
/// Numbers and booleans become strings, an empty field is left out and an
/// empty host is an empty record. Other values are left for the schema to
/// reject.
fn normalize(value: &mut Value) {
    let Value::Object(hosts) = value else {
        return;
    };

    for record in hosts.values_mut() {
        if record.is_null() {
            *record = Value::Object(Map::new());
        }
        if let Value::Object(fields) = record {
            fields.retain(|_, field| !field.is_null());
            for field in fields.values_mut() {
                if let Value::Bool(_) | Value::Number(_) = field {
                    *field = Value::String(field.to_string());
                }
            }
        }
    }
}

/// The host registry file.
///
/// Every operation is a whole-file read-modify-write.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn hosts(&self) -> Result<Registry, ConfigError> {
        load_from_path(&self.path)
    }

    /// Reads one host.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingHost` if the alias is unknown.
    pub fn host(&self, alias: &str) -> Result<HostRecord, ConfigError> {
        self.hosts()?.get(alias).cloned()
    }

    /// Replaces the registry file with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write(&self, registry: &Registry) -> Result<(), ConfigError> {
        save_to_path(&self.path, registry)
    }

    /// Adds or replaces the given entries.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing the registry fails.
    pub fn add_hosts(&self, hosts: Registry) -> Result<(), ConfigError> {
        let mut registry = self.hosts()?;
        registry.extend(hosts);
        self.write(&registry)
    }

    /// Removes the given aliases.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingHost` if any alias is unknown; nothing is
    /// written in that case.
    pub fn remove_hosts<S: AsRef<str>>(&self, aliases: &[S]) -> Result<(), ConfigError> {
        let mut registry = self.hosts()?;

        for alias in aliases {
            let alias = alias.as_ref();
            if registry.remove(alias).is_none() {
                return Err(ConfigError::MissingHost(alias.to_string()));
            }
        }

        self.write(&registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(pairs: &[(&str, &str)]) -> HostRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_load_from_str_empty() {
        assert!(load_from_str("").unwrap().is_empty());
        assert!(load_from_str("{}\n").unwrap().is_empty());
        assert!(load_from_str("~\n").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_str_hosts() {
        let registry = load_from_str(
            "gpu1:\n  host: gpu1\n  user: alice\nlogin:\n  host: login\n  hostname: login.lab\n",
        )
        .unwrap();
        assert_eq!(registry.aliases(), vec!["gpu1", "login"]);
        assert_eq!(registry.get("login").unwrap().get("hostname"), Some("login.lab"));
    }

    #[test]
    fn test_load_from_str_invalid_yaml() {
        let result = load_from_str("gpu1: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_load_from_str_rejects_non_string_values() {
        let result = load_from_str("gpu1:\n  host: gpu1\n  ports: [22]\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_str_empty_fields_are_absent() {
        let registry = load_from_str("gpu1:\n  host: gpu1\n  jump_through:\nlogin:\n").unwrap();

        let gpu1 = registry.get("gpu1").unwrap();
        assert!(!gpu1.contains("jump_through"));
        assert_eq!(gpu1.alias(), Some("gpu1"));
        assert!(registry.get("login").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_str_scalars_become_strings() {
        let registry =
            load_from_str("gpu1:\n  host: gpu1\n  user: 1234\n  rack: 1.5\n  shared: true\n")
                .unwrap();

        let gpu1 = registry.get("gpu1").unwrap();
        assert_eq!(gpu1.get("user"), Some("1234"));
        assert_eq!(gpu1.get("rack"), Some("1.5"));
        assert_eq!(gpu1.get("shared"), Some("true"));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let registry = load_from_path(Path::new("/nonexistent/path/hosts.yaml")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_many_later_files_win_and_inject_alias() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.yaml");
        let second = dir.path().join("b.yaml");
        fs::write(&first, "gpu1:\n  user: alice\nlogin:\n  user: alice\n").unwrap();
        fs::write(&second, "gpu1:\n  user: bob\n").unwrap();

        let registry = load_many(&[first, second]).unwrap();

        assert_eq!(registry.get("gpu1").unwrap().get("user"), Some("bob"));
        assert_eq!(registry.get("login").unwrap().alias(), Some("login"));
    }

    #[test]
    fn test_save_preserves_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hosts.yaml");
        let mut registry = Registry::new();
        registry.insert("gpu1", record(&[("host", "gpu1"), ("rack", "b12")]));

        save_to_path(&path, &registry).unwrap();

        assert_eq!(load_from_path(&path).unwrap(), registry);
    }

    #[test]
    fn test_store_add_then_remove_restores_keys() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("hosts.yaml"));
        let mut initial = Registry::new();
        initial.insert("login", record(&[("host", "login")]));
        store.write(&initial).unwrap();

        let mut added = Registry::new();
        added.insert("A", record(&[("host", "A"), ("user", "alice")]));
        store.add_hosts(added).unwrap();
        assert_eq!(store.hosts().unwrap().aliases(), vec!["A", "login"]);

        store.remove_hosts(&["A"]).unwrap();
        assert_eq!(store.hosts().unwrap().aliases(), vec!["login"]);
    }

    #[test]
    fn test_store_remove_unknown_host_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("hosts.yaml"));
        let mut initial = Registry::new();
        initial.insert("login", record(&[("host", "login")]));
        store.write(&initial).unwrap();

        let result = store.remove_hosts(&["login", "ghost"]);

        assert!(matches!(result, Err(ConfigError::MissingHost(alias)) if alias == "ghost"));
        assert!(store.hosts().unwrap().contains("login"));
    }

    #[test]
    fn test_store_host_missing() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("hosts.yaml"));
        assert!(matches!(store.host("gpu1"), Err(ConfigError::MissingHost(_))));
    }
}
