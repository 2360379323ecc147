use std::path::Path;
use std::process::Command;

/// Lazily detaches a FUSE mount, so busy mountpoints are released once idle.
pub(crate) fn unmount_command(mount_point: &Path) -> Command {
    let mut cmd = Command::new("fusermount");
    cmd.arg("-zu").arg(mount_point);
    cmd
}
