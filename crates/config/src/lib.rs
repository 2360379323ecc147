mod error;
mod fields;
mod loader;
mod paths;
mod schema;
mod types;

pub use error::ConfigError;
pub use fields::{
    DEFAULT_AUTH_KEYS, DefaultRule, Field, HELP, HOST_FIELDS, Prompt, current_user, field, resolve,
};
pub use loader::{Store, load_from_path, load_from_str, load_many, save_to_path};
pub use paths::{MOUNTS_VAR, Paths, ROOT_VAR, USER_SCRIPTS_VAR, expand_tilde};
pub use schema::{ValidationError, ValidationResult, schema, validate};
pub use types::{HOST, HostRecord, Registry};
