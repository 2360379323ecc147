//! Write permission toggling on the mount root.
//!
//! The mount root is kept without write permission so that a recursive delete
//! started above it stops there. Only the mountpoints are protected this way;
//! the contents of a mounted host are not.

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

const OWNER_WRITE: u32 = 0o200;
const ANY_WRITE: u32 = 0o222;

/// Grants owner write permission.
pub(crate) fn unlock(path: &Path) -> io::Result<()> {
    let mode = fs::metadata(path)?.permissions().mode();
    fs::set_permissions(path, Permissions::from_mode(mode | OWNER_WRITE))
}

/// Removes write permission for everyone.
pub(crate) fn lock(path: &Path) -> io::Result<()> {
    let mode = fs::metadata(path)?.permissions().mode();
    fs::set_permissions(path, Permissions::from_mode(mode & !ANY_WRITE))
}

/// Whether the owner may write to `path`.
pub fn is_locked(path: &Path) -> io::Result<bool> {
    Ok(fs::metadata(path)?.mode() & OWNER_WRITE == 0)
}

/// Whether `path` is the root of a mounted filesystem.
///
/// A mountpoint that cannot be inspected at all (other than by not existing)
/// counts as mounted: broken FUSE connections fail `stat` with `ENOTCONN`.
pub(crate) fn is_mount_point(path: &Path) -> bool {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "unreadable mountpoint");
            return true;
        }
    };

    if meta.file_type().is_symlink() {
        return false;
    }

    let Some(parent) = path.parent() else {
        return true;
    };
    let Ok(parent_meta) = fs::metadata(parent) else {
        return false;
    };

    meta.dev() != parent_meta.dev() || meta.ino() == parent_meta.ino()
}
