//! The syscall seam between the launcher and the kernel.
//!
//! Every kernel interaction brig performs goes through the [`Sys`]
//! trait. Production code uses the Linux backend returned by
//! [`host_sys`]; tests substitute [`fake::FakeSys`], which records each
//! call and can be armed to fail any operation, so the setup sequence
//! and its failure handling can be exercised without privilege.

pub mod fake;
pub mod linux;

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;

use brig_common::config::Namespaces;
use brig_common::error::Result;
#[cfg(not(target_os = "linux"))]
use brig_common::error::Error;
use nix::unistd::Pid;

/// Kernel-managed filesystems mountable inside the jail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialFs {
    /// The process information pseudo-filesystem.
    Proc,
}

impl SpecialFs {
    /// Filesystem type string passed to the mount call.
    #[must_use]
    pub const fn fstype(self) -> &'static str {
        match self {
            Self::Proc => "proc",
        }
    }
}

/// How a reaped child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// The child called `exit` with the given status code.
    Exited(i32),
    /// The child was terminated by the given signal number.
    Signaled(i32),
}

impl ChildStatus {
    /// Returns `true` for a clean zero exit.
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with status {code}"),
            Self::Signaled(signal) => write!(f, "killed by signal {signal}"),
        }
    }
}

/// Function run as the body of a newly created child process.
///
/// The returned value becomes the child's exit status.
pub type ChildEntry<'a> = Box<dyn FnMut() -> i32 + 'a>;

/// Platform operations used by the launcher and the jailed child.
///
/// Each method maps to a single kernel interaction so that call order,
/// arguments, and failure handling can be observed through a recording
/// implementation. Errors are reported as [`io::Error`] values carrying
/// the OS errno; callers attach launch-specific context.
pub trait Sys {
    /// Creates a child process in the requested namespaces, running
    /// `entry` on the supplied stack. Termination of the child raises
    /// `SIGCHLD` in the caller so it can be reaped with [`Sys::wait_child`].
    ///
    /// # Safety
    ///
    /// The stack buffer is used by the child for its entire lifetime.
    /// The caller must keep the buffer allocated and otherwise untouched
    /// until the child has been reaped.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel refuses to create the process,
    /// typically for lack of privilege over the requested namespaces.
    unsafe fn spawn_isolated(
        &self,
        namespaces: Namespaces,
        stack: &mut [u8],
        entry: ChildEntry<'_>,
    ) -> io::Result<Pid>;

    /// Blocks until the given child terminates and returns how it ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be waited on, for example
    /// when the pid does not name a child of the caller.
    fn wait_child(&self, pid: Pid) -> io::Result<ChildStatus>;

    /// Marks the entire mount tree of the calling process private, so
    /// mount events no longer propagate to the parent namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the remount fails.
    fn make_mount_private(&self) -> io::Result<()>;

    /// Sets the hostname of the calling process's UTS namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the name.
    fn set_host_identity(&self, name: &str) -> io::Result<()>;

    /// Confines the calling process to `path` as its root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is missing, not a directory, or the
    /// caller lacks the privilege to change root.
    fn confine_root(&self, path: &Path) -> io::Result<()>;

    /// Changes the working directory of the calling process.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be entered.
    fn set_workdir(&self, path: &Path) -> io::Result<()>;

    /// Mounts a kernel filesystem at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails, for example when `target`
    /// does not exist in the jail.
    fn mount_special(&self, fs: SpecialFs, target: &Path) -> io::Result<()>;

    /// Detaches the mount at `target` without waiting for it to become
    /// unbusy.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` is not a mount point or the detach
    /// is not permitted.
    fn unmount_lazy(&self, target: &Path) -> io::Result<()>;

    /// Removes every variable from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be cleared.
    fn scrub_env(&self) -> io::Result<()>;

    /// Sets one environment variable for the calling process.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not representable.
    fn set_env_var(&self, name: &str, value: &str) -> io::Result<()>;

    /// Replaces the current process image with `program`.
    ///
    /// On success the kernel has discarded this program, so control
    /// never actually reaches the `Ok` return; only recording
    /// implementations produce it, which keeps the calling sequence
    /// observable in tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be executed, most often
    /// because it does not exist inside the jail or its interpreter or
    /// loader is missing.
    fn exec(&self, program: &Path, argv: &[OsString]) -> io::Result<()>;
}

/// Returns the syscall backend for the host platform.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] on platforms without Linux namespace
/// support.
pub fn host_sys() -> Result<Box<dyn Sys>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::LinuxSys::new()))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Err(Error::Unsupported {
            message: "namespace isolation requires Linux".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exit_is_the_only_success() {
        assert!(ChildStatus::Exited(0).success());
        assert!(!ChildStatus::Exited(1).success());
        assert!(!ChildStatus::Signaled(9).success());
    }

    #[test]
    fn status_display_names_the_ending() {
        assert_eq!(ChildStatus::Exited(3).to_string(), "exited with status 3");
        assert_eq!(ChildStatus::Signaled(15).to_string(), "killed by signal 15");
    }

    #[test]
    fn proc_mounts_as_proc() {
        assert_eq!(SpecialFs::Proc.fstype(), "proc");
    }
}
