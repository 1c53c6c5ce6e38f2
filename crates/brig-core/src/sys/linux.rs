//! Linux syscall backend.
//!
//! Thin wrappers over `nix` and `libc`. Each method performs exactly one
//! kernel interaction and converts the errno into [`io::Error`]; context
//! about which launch step failed is attached by the caller.

use std::ffi::OsString;
use std::io;
use std::path::Path;

use brig_common::config::Namespaces;
use nix::unistd::Pid;

use super::{ChildEntry, ChildStatus, SpecialFs, Sys};

/// Syscall backend that talks to the running Linux kernel.
pub struct LinuxSys;

impl LinuxSys {
    /// Creates the Linux backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for LinuxSys {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates the namespace selection into `clone(2)` flags.
#[cfg(target_os = "linux")]
fn clone_flags(namespaces: Namespaces) -> nix::sched::CloneFlags {
    use nix::sched::CloneFlags;

    let mut flags = CloneFlags::empty();
    if namespaces.uts {
        flags |= CloneFlags::CLONE_NEWUTS;
    }
    if namespaces.pid {
        flags |= CloneFlags::CLONE_NEWPID;
    }
    if namespaces.mount {
        flags |= CloneFlags::CLONE_NEWNS;
    }
    if namespaces.net {
        flags |= CloneFlags::CLONE_NEWNET;
    }
    flags
}

#[cfg(target_os = "linux")]
impl Sys for LinuxSys {
    unsafe fn spawn_isolated(
        &self,
        namespaces: Namespaces,
        stack: &mut [u8],
        mut entry: ChildEntry<'_>,
    ) -> io::Result<Pid> {
        use nix::sched::clone;
        use nix::sys::signal::Signal;

        let flags = clone_flags(namespaces);
        // SAFETY: forwarded to the caller, who keeps the stack buffer
        // allocated until the child has been reaped.
        let pid = unsafe {
            clone(
                Box::new(move || entry() as isize),
                stack,
                flags,
                Some(Signal::SIGCHLD as libc::c_int),
            )
        }?;
        Ok(pid)
    }

    fn wait_child(&self, pid: Pid) -> io::Result<ChildStatus> {
        use nix::errno::Errno;
        use nix::sys::wait::{WaitStatus, waitpid};

        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(ChildStatus::Exited(code)),
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    return Ok(ChildStatus::Signaled(signal as i32));
                }
                // Not requested via wait options; keep blocking until
                // the child actually terminates.
                Ok(_) => {}
                Err(Errno::EINTR) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn make_mount_private(&self) -> io::Result<()> {
        use nix::mount::{MsFlags, mount};

        mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        )?;
        Ok(())
    }

    fn set_host_identity(&self, name: &str) -> io::Result<()> {
        nix::unistd::sethostname(name)?;
        Ok(())
    }

    fn confine_root(&self, path: &Path) -> io::Result<()> {
        nix::unistd::chroot(path)?;
        Ok(())
    }

    fn set_workdir(&self, path: &Path) -> io::Result<()> {
        nix::unistd::chdir(path)?;
        Ok(())
    }

    fn mount_special(&self, fs: SpecialFs, target: &Path) -> io::Result<()> {
        use nix::mount::{MsFlags, mount};

        mount(
            Some(fs.fstype()),
            target,
            Some(fs.fstype()),
            MsFlags::empty(),
            None::<&str>,
        )?;
        Ok(())
    }

    fn unmount_lazy(&self, target: &Path) -> io::Result<()> {
        use nix::mount::{MntFlags, umount2};

        umount2(target, MntFlags::MNT_DETACH)?;
        Ok(())
    }

    fn scrub_env(&self) -> io::Result<()> {
        // SAFETY: only called from the jailed child, which is single
        // threaded, so no other thread can observe the environment
        // while it is torn down.
        let rc = unsafe { libc::clearenv() };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::other("clearenv failed"))
        }
    }

    fn set_env_var(&self, name: &str, value: &str) -> io::Result<()> {
        // std::env::set_var panics on these instead of reporting them.
        if name.is_empty() || name.contains(['=', '\0']) || value.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("environment variable {name:?} is not representable"),
            ));
        }
        // SAFETY: only called from the jailed child, which is single
        // threaded, so the mutation cannot race a concurrent read.
        unsafe { std::env::set_var(name, value) };
        Ok(())
    }

    fn exec(&self, program: &Path, argv: &[OsString]) -> io::Result<()> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let path = CString::new(program.as_os_str().as_bytes()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "program path contains a NUL byte")
        })?;
        let args = argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "argument contains a NUL byte")
            })?;
        let never = nix::unistd::execv(&path, &args)?;
        match never {}
    }
}

/// Stub for non-Linux platforms. Every operation fails; [`super::host_sys`]
/// refuses to hand out this backend off Linux in the first place.
#[cfg(not(target_os = "linux"))]
impl Sys for LinuxSys {
    unsafe fn spawn_isolated(
        &self,
        _namespaces: Namespaces,
        _stack: &mut [u8],
        _entry: ChildEntry<'_>,
    ) -> io::Result<Pid> {
        Err(unsupported())
    }

    fn wait_child(&self, _pid: Pid) -> io::Result<ChildStatus> {
        Err(unsupported())
    }

    fn make_mount_private(&self) -> io::Result<()> {
        Err(unsupported())
    }

    fn set_host_identity(&self, _name: &str) -> io::Result<()> {
        Err(unsupported())
    }

    fn confine_root(&self, _path: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn set_workdir(&self, _path: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn mount_special(&self, _fs: SpecialFs, _target: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn unmount_lazy(&self, _target: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn scrub_env(&self) -> io::Result<()> {
        Err(unsupported())
    }

    fn set_env_var(&self, _name: &str, _value: &str) -> io::Result<()> {
        Err(unsupported())
    }

    fn exec(&self, _program: &Path, _argv: &[OsString]) -> io::Result<()> {
        Err(unsupported())
    }
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "Linux required for namespace isolation")
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use nix::sched::CloneFlags;

    #[test]
    fn full_namespace_selection_maps_to_all_four_flags() {
        let flags = clone_flags(Namespaces::default());
        assert!(flags.contains(CloneFlags::CLONE_NEWUTS));
        assert!(flags.contains(CloneFlags::CLONE_NEWPID));
        assert!(flags.contains(CloneFlags::CLONE_NEWNS));
        assert!(flags.contains(CloneFlags::CLONE_NEWNET));
    }

    #[test]
    fn empty_namespace_selection_maps_to_no_flags() {
        assert!(clone_flags(Namespaces::none()).is_empty());
    }

    #[test]
    fn partial_namespace_selection_maps_only_whats_requested() {
        let mut namespaces = Namespaces::none();
        namespaces.uts = true;
        let flags = clone_flags(namespaces);
        assert_eq!(flags, CloneFlags::CLONE_NEWUTS);
    }

    #[test]
    fn env_var_with_equals_in_name_is_rejected_not_panicked() {
        let err = LinuxSys::new()
            .set_env_var("BAD=NAME", "x")
            .expect_err("name with '=' must be rejected");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn env_var_with_nul_in_value_is_rejected_not_panicked() {
        let err = LinuxSys::new()
            .set_env_var("GOOD", "bad\0value")
            .expect_err("value with NUL must be rejected");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn exec_of_missing_program_reports_not_found() {
        let err = LinuxSys::new()
            .exec(
                Path::new("/nonexistent/brig-test-binary"),
                &[OsString::from("/nonexistent/brig-test-binary")],
            )
            .expect_err("exec of a missing program must fail");
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn exec_with_nul_in_path_is_rejected_before_the_syscall() {
        let err = LinuxSys::new()
            .exec(Path::new("/bin\0/sh"), &[])
            .expect_err("NUL in path must be rejected");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
