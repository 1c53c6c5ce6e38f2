//! Recording syscall backend for tests.
//!
//! [`FakeSys`] implements [`Sys`] without touching the kernel: every
//! call is appended to an ordered log, and any operation can be armed
//! to fail with a chosen errno. A fake child runs its entry function
//! inline in the test process, so the whole launch sequence, from
//! process creation through exec, lands in a single observable log.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use brig_common::config::Namespaces;
use nix::unistd::Pid;

use super::{ChildEntry, ChildStatus, SpecialFs, Sys};

/// Pid reported for fake children.
pub const FAKE_CHILD_PID: i32 = 4242;

/// One recorded kernel interaction, with the arguments it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysCall {
    /// A child was created.
    SpawnIsolated {
        /// Namespace selection passed to the spawn.
        namespaces: Namespaces,
        /// Size of the stack buffer handed over.
        stack_size: usize,
    },
    /// A child was waited on.
    WaitChild {
        /// Raw pid that was reaped.
        pid: i32,
    },
    /// The mount tree was made private.
    MakeMountPrivate,
    /// The UTS hostname was set.
    SetHostIdentity {
        /// Requested hostname.
        name: String,
    },
    /// The root directory was changed.
    ConfineRoot {
        /// New root path.
        path: PathBuf,
    },
    /// The working directory was changed.
    SetWorkdir {
        /// New working directory.
        path: PathBuf,
    },
    /// A kernel filesystem was mounted.
    MountSpecial {
        /// Which filesystem.
        fs: SpecialFs,
        /// Mount target.
        target: PathBuf,
    },
    /// A mount was lazily detached.
    UnmountLazy {
        /// Unmount target.
        target: PathBuf,
    },
    /// The environment was cleared.
    ScrubEnv,
    /// One environment variable was set.
    SetEnvVar {
        /// Variable name.
        name: String,
        /// Variable value.
        value: String,
    },
    /// The process image was replaced.
    Exec {
        /// Program path.
        program: PathBuf,
        /// Full argument vector.
        argv: Vec<OsString>,
    },
}

impl SysCall {
    /// Short name of the operation, matching the [`Sys`] method.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SpawnIsolated { .. } => "spawn_isolated",
            Self::WaitChild { .. } => "wait_child",
            Self::MakeMountPrivate => "make_mount_private",
            Self::SetHostIdentity { .. } => "set_host_identity",
            Self::ConfineRoot { .. } => "confine_root",
            Self::SetWorkdir { .. } => "set_workdir",
            Self::MountSpecial { .. } => "mount_special",
            Self::UnmountLazy { .. } => "unmount_lazy",
            Self::ScrubEnv => "scrub_env",
            Self::SetEnvVar { .. } => "set_env_var",
            Self::Exec { .. } => "exec",
        }
    }
}

/// Operations that can be armed to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    /// Fail process creation.
    Spawn,
    /// Fail reaping.
    Wait,
    /// Fail the private remount.
    MountPrivate,
    /// Fail setting the hostname.
    HostIdentity,
    /// Fail the root change.
    ConfineRoot,
    /// Fail the working directory change.
    Workdir,
    /// Fail mounting a kernel filesystem.
    MountSpecial,
    /// Fail the lazy unmount.
    Unmount,
    /// Fail clearing the environment.
    ScrubEnv,
    /// Fail setting an environment variable.
    SetEnvVar,
    /// Fail replacing the process image.
    Exec,
}

/// In-memory [`Sys`] implementation that records instead of acting.
///
/// Failed operations still appear in the log, so a test can assert both
/// that an attempt was made and that nothing ran after it.
#[derive(Default)]
pub struct FakeSys {
    calls: RefCell<Vec<SysCall>>,
    failures: RefCell<HashMap<FakeOp, i32>>,
    once_failures: RefCell<HashMap<FakeOp, i32>>,
    child_exit: Cell<Option<i32>>,
}

impl FakeSys {
    /// Creates a fake with nothing armed to fail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `op` to fail with the given errno on every call.
    pub fn fail_with(&self, op: FakeOp, errno: i32) {
        let _ = self.failures.borrow_mut().insert(op, errno);
    }

    /// Arms `op` to fail with the given errno on its next call only;
    /// later calls succeed again.
    pub fn fail_once(&self, op: FakeOp, errno: i32) {
        let _ = self.once_failures.borrow_mut().insert(op, errno);
    }

    /// Returns a copy of the recorded call log, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<SysCall> {
        self.calls.borrow().clone()
    }

    /// Returns just the operation names, in call order.
    #[must_use]
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(SysCall::name).collect()
    }

    fn record(&self, call: SysCall) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, op: FakeOp) -> io::Result<()> {
        if let Some(errno) = self.once_failures.borrow_mut().remove(&op) {
            return Err(io::Error::from_raw_os_error(errno));
        }
        match self.failures.borrow().get(&op) {
            Some(&errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(()),
        }
    }
}

impl Sys for FakeSys {
    unsafe fn spawn_isolated(
        &self,
        namespaces: Namespaces,
        stack: &mut [u8],
        mut entry: ChildEntry<'_>,
    ) -> io::Result<Pid> {
        self.record(SysCall::SpawnIsolated {
            namespaces,
            stack_size: stack.len(),
        });
        self.check(FakeOp::Spawn)?;
        // The fake child runs right here, appending its own calls to
        // the shared log before the spawn returns.
        let code = entry();
        self.child_exit.set(Some(code));
        Ok(Pid::from_raw(FAKE_CHILD_PID))
    }

    fn wait_child(&self, pid: Pid) -> io::Result<ChildStatus> {
        self.record(SysCall::WaitChild { pid: pid.as_raw() });
        self.check(FakeOp::Wait)?;
        match self.child_exit.take() {
            Some(code) => Ok(ChildStatus::Exited(code)),
            None => Err(io::Error::from_raw_os_error(libc::ECHILD)),
        }
    }

    fn make_mount_private(&self) -> io::Result<()> {
        self.record(SysCall::MakeMountPrivate);
        self.check(FakeOp::MountPrivate)
    }

    fn set_host_identity(&self, name: &str) -> io::Result<()> {
        self.record(SysCall::SetHostIdentity {
            name: name.to_owned(),
        });
        self.check(FakeOp::HostIdentity)
    }

    fn confine_root(&self, path: &Path) -> io::Result<()> {
        self.record(SysCall::ConfineRoot {
            path: path.to_path_buf(),
        });
        self.check(FakeOp::ConfineRoot)
    }

    fn set_workdir(&self, path: &Path) -> io::Result<()> {
        self.record(SysCall::SetWorkdir {
            path: path.to_path_buf(),
        });
        self.check(FakeOp::Workdir)
    }

    fn mount_special(&self, fs: SpecialFs, target: &Path) -> io::Result<()> {
        self.record(SysCall::MountSpecial {
            fs,
            target: target.to_path_buf(),
        });
        self.check(FakeOp::MountSpecial)
    }

    fn unmount_lazy(&self, target: &Path) -> io::Result<()> {
        self.record(SysCall::UnmountLazy {
            target: target.to_path_buf(),
        });
        self.check(FakeOp::Unmount)
    }

    fn scrub_env(&self) -> io::Result<()> {
        self.record(SysCall::ScrubEnv);
        self.check(FakeOp::ScrubEnv)
    }

    fn set_env_var(&self, name: &str, value: &str) -> io::Result<()> {
        self.record(SysCall::SetEnvVar {
            name: name.to_owned(),
            value: value.to_owned(),
        });
        self.check(FakeOp::SetEnvVar)
    }

    fn exec(&self, program: &Path, argv: &[OsString]) -> io::Result<()> {
        self.record(SysCall::Exec {
            program: program.to_path_buf(),
            argv: argv.to_vec(),
        });
        self.check(FakeOp::Exec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_are_recorded_in_order() {
        let fake = FakeSys::new();
        fake.make_mount_private().expect("fake op");
        fake.set_host_identity("box").expect("fake op");
        fake.scrub_env().expect("fake op");
        assert_eq!(
            fake.call_names(),
            ["make_mount_private", "set_host_identity", "scrub_env"]
        );
    }

    #[test]
    fn armed_operation_fails_with_that_errno_and_is_still_logged() {
        let fake = FakeSys::new();
        fake.fail_with(FakeOp::ConfineRoot, libc::EPERM);
        let err = fake
            .confine_root(Path::new("/jail"))
            .expect_err("armed op must fail");
        assert_eq!(err.raw_os_error(), Some(libc::EPERM));
        assert_eq!(fake.call_names(), ["confine_root"]);
    }

    #[test]
    fn one_shot_failure_clears_after_the_first_call() {
        let fake = FakeSys::new();
        fake.fail_once(FakeOp::Unmount, libc::EBUSY);
        let err = fake
            .unmount_lazy(Path::new("/jail/proc"))
            .expect_err("first call armed to fail");
        assert_eq!(err.raw_os_error(), Some(libc::EBUSY));
        fake.unmount_lazy(Path::new("/jail"))
            .expect("second call succeeds");
    }

    #[test]
    fn wait_without_a_spawned_child_reports_echild() {
        let fake = FakeSys::new();
        let err = fake
            .wait_child(Pid::from_raw(FAKE_CHILD_PID))
            .expect_err("nothing to reap");
        assert_eq!(err.raw_os_error(), Some(libc::ECHILD));
    }

    #[test]
    fn spawn_runs_the_entry_inline_and_wait_returns_its_code() {
        let fake = FakeSys::new();
        let mut stack = vec![0_u8; 64];
        // SAFETY: the fake never touches the stack buffer.
        let pid = unsafe {
            fake.spawn_isolated(
                Namespaces::none(),
                &mut stack,
                Box::new(|| 7),
            )
        }
        .expect("fake spawn");
        assert_eq!(pid.as_raw(), FAKE_CHILD_PID);
        let status = fake.wait_child(pid).expect("fake wait");
        assert_eq!(status, ChildStatus::Exited(7));
    }

    #[test]
    fn failed_spawn_never_runs_the_entry() {
        let fake = FakeSys::new();
        fake.fail_with(FakeOp::Spawn, libc::EPERM);
        let mut stack = vec![0_u8; 64];
        let mut ran = false;
        // SAFETY: the fake never touches the stack buffer.
        let result = unsafe {
            fake.spawn_isolated(
                Namespaces::default(),
                &mut stack,
                Box::new(|| {
                    ran = true;
                    0
                }),
            )
        };
        assert!(result.is_err());
        assert!(!ran);
    }
}
