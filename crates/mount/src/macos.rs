use std::path::Path;
use std::process::Command;

/// macOS has no `fusermount`; macFUSE volumes are released with `umount`.
pub(crate) fn unmount_command(mount_point: &Path) -> Command {
    let mut cmd = Command::new("umount");
    cmd.arg(mount_point);
    cmd
}
