//! Child creation and reaping.
//!
//! [`launch`] performs the combined process-creation-and-namespace call:
//! the child is born already inside every requested namespace, so no
//! intermediate state exists in which it could be observed outside its
//! isolation boundary. The returned [`Child`] owns both the process
//! identifier and the stack buffer the child runs on; [`wait`] consumes
//! it, so the identifier cannot be used after the reap and the stack
//! cannot be released while the child is alive.
//!
//! The rootfs handed to the child is prepared by an external tool and
//! must satisfy a contract the launcher itself never checks:
//!
//! - the configured command exists at its path inside the rootfs;
//! - if the command is dynamically linked, its loader and every shared
//!   library exist at exactly the paths embedded in the binary — no
//!   library resolution happens here;
//! - a directory exists at `/proc` to receive the procfs mount;
//! - standard device nodes (null, zero, tty, random, urandom) should
//!   exist; their absence degrades utilities but does not fail the
//!   launch.
//!
//! A rootfs violating the contract surfaces inside the child, at the
//! chroot or exec step, as a nonzero child exit — never as a launcher
//! error.

use brig_common::config::LaunchConfig;
use brig_common::error::{Error, Result};
use brig_core::entry;
use brig_core::sys::{ChildStatus, Sys};
use nix::unistd::Pid;

/// A created, not yet reaped container process.
///
/// Owns the stack buffer the child executes on, so the buffer provably
/// outlives the child: it is released only when the `Child` is consumed
/// by [`wait`] (or dropped, which must only happen after the process is
/// known to be gone).
pub struct Child {
    pid: Pid,
    stack: Vec<u8>,
}

impl Child {
    /// The child's process identifier in the launcher's pid namespace.
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }
}

impl std::fmt::Debug for Child {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Child")
            .field("pid", &self.pid.as_raw())
            .field("stack_size", &self.stack.len())
            .finish()
    }
}

/// Creates the container process.
///
/// Reserves a fresh stack buffer for this launch attempt and asks the
/// kernel for a child inside the configured namespaces, running the jail
/// setup sequence as its body. The child proceeds on its own from here;
/// the caller should move on to [`wait`].
///
/// # Errors
///
/// Returns [`Error::Config`] if the configuration is malformed, or
/// [`Error::Spawn`] if the kernel refuses the creation call — typically
/// for lack of privilege over the requested namespaces, or an exhausted
/// namespace limit. Both are fatal to the launcher; nothing was created.
pub fn launch(sys: &dyn Sys, config: &LaunchConfig) -> Result<Child> {
    config.validate()?;

    let mut stack = vec![0_u8; config.stack_size];
    // SAFETY: the buffer is moved into the returned Child, which keeps
    // it allocated and untouched until wait() has reaped the process.
    let pid = unsafe {
        sys.spawn_isolated(
            config.namespaces,
            &mut stack,
            Box::new(|| entry::child_main(sys, config)),
        )
    }
    .map_err(|source| Error::Spawn { source })?;

    tracing::info!(pid = pid.as_raw(), "container process created");
    Ok(Child { pid, stack })
}

/// Blocks until the child terminates and reaps it.
///
/// Consuming the [`Child`] makes the (now recycled) process identifier
/// unusable and releases the stack buffer. A nonzero child status is a
/// normal outcome here, not an error: the child reports its own setup
/// failures on stderr before exiting.
///
/// # Errors
///
/// Returns [`Error::Reap`] if the wait call itself fails. Fatal to the
/// launcher.
pub fn wait(sys: &dyn Sys, child: Child) -> Result<ChildStatus> {
    let status = sys
        .wait_child(child.pid)
        .map_err(|source| Error::Reap { source })?;
    tracing::info!(pid = child.pid.as_raw(), status = %status, "container process reaped");
    Ok(status)
}
