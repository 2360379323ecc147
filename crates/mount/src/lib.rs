mod error;
mod guard;
mod manager;

#[cfg(not(target_os = "macos"))]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(not(target_os = "macos"))]
use linux::unmount_command;
#[cfg(target_os = "macos")]
use macos::unmount_command;

pub use error::MountError;
pub use guard::is_locked;
pub use manager::{MountManager, SSHFS_OPTIONS, mount_address};
