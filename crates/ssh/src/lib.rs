mod config_file;
mod error;
mod keys;
mod remote;

pub use config_file::{
    HostBlock, append_block, block_lines, declared_hosts, is_written_block, remove_block,
    strip_block,
};
pub use error::SshError;
pub use keys::{AuthorizedKeys, KeyOptions, ensure_key, send_key};
pub use remote::{copy, run, session};
