//! Best-effort mount cleanup after the child is gone.
//!
//! The child's mounts lived in its own private mount namespace, so the
//! kernel releases them when the last process in that namespace exits —
//! in the routine case there is nothing for the parent to undo. This
//! pass exists to recover from partial setup: a child that died after
//! mounting procfs but before its mount namespace took effect can leave
//! a mount visible in the host's table under the rootfs path.
//!
//! Cleanup never escalates. Its outcome is a value the caller can log
//! at warn and otherwise ignore; a failed cleanup is not a failed
//! launch.

use std::io;
use std::path::Path;

use brig_core::sys::Sys;
use thiserror::Error;

/// What the cleanup pass ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// A procfs mount under the rootfs was lazily detached.
    ProcUnmounted,
    /// The proc unmount failed, so the rootfs path itself was lazily
    /// detached as a whole.
    RootfsDetached,
    /// Nothing was mounted in the host's namespace; there was nothing
    /// to clean up. The routine case.
    NothingMounted,
}

/// Both cleanup attempts failed.
///
/// Inspectable but non-fatal: callers log it and move on.
#[derive(Debug, Error)]
#[error("cleanup left mounts behind: unmounting proc failed ({proc_error}), detaching rootfs failed ({rootfs_error})")]
pub struct CleanupWarning {
    /// Error from the narrow `<rootfs>/proc` unmount.
    pub proc_error: io::Error,
    /// Error from the fallback detach of the rootfs path.
    pub rootfs_error: io::Error,
}

/// The target was simply not a mount point (or does not exist), which
/// is what a clean run looks like from the host's namespace.
fn nothing_mounted(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::EINVAL || code == libc::ENOENT
    )
}

/// Attempts to release any mount the dead child left visible under
/// `rootfs` in the host's mount table.
///
/// Tries a lazy unmount of `<rootfs>/proc` first; only if a mount is
/// genuinely there and cannot be detached does the pass fall back to
/// lazily detaching the rootfs path as a whole. The fallback never
/// fires when the proc target simply was not mounted, so a rootfs path
/// reused across launches does not lose unrelated mounts on the routine
/// path.
///
/// # Errors
///
/// Returns [`CleanupWarning`] when both attempts fail; the warning is
/// for logging, not propagation.
pub fn cleanup(
    sys: &dyn Sys,
    rootfs: &Path,
) -> std::result::Result<CleanupOutcome, CleanupWarning> {
    let proc_target = rootfs.join("proc");
    let proc_error = match sys.unmount_lazy(&proc_target) {
        Ok(()) => {
            tracing::debug!(target_path = %proc_target.display(), "stale procfs mount detached");
            return Ok(CleanupOutcome::ProcUnmounted);
        }
        Err(e) if nothing_mounted(&e) => {
            tracing::debug!("no stale mounts in the host namespace");
            return Ok(CleanupOutcome::NothingMounted);
        }
        Err(e) => e,
    };

    match sys.unmount_lazy(rootfs) {
        Ok(()) => {
            tracing::debug!(rootfs = %rootfs.display(), "rootfs lazily detached");
            Ok(CleanupOutcome::RootfsDetached)
        }
        Err(rootfs_error) => Err(CleanupWarning {
            proc_error,
            rootfs_error,
        }),
    }
}
