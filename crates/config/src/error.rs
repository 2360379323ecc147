use crate::schema::ValidationError;
use std::io;
use thiserror::Error;

/// Error type for registry and configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Home directory not found.
    #[error("could not determine home directory")]
    NoHomeDir,

    /// A required setting (usually an environment variable) is not set.
    #[error("the {0} environment variable is not defined")]
    MissingVariable(&'static str),

    /// The alias is not in the registry.
    #[error("host '{0}' doesn't exist. Use `clu setuphost` if you want to set up a new host")]
    MissingHost(String),

    /// Registry file I/O error.
    #[error("failed to access host registry: {0}")]
    Io(#[from] io::Error),

    /// Registry YAML parse or dump error.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Registry schema validation error.
    #[error("host registry validation failed: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    /// Reading an answer from the user failed.
    #[error("failed to read a value for '{field}': {source}")]
    Prompt { field: String, source: io::Error },
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
