//! The jailed child's setup sequence.
//!
//! After the child is created inside its namespaces, [`enter`] walks a
//! fixed sequence of isolation steps and finishes by replacing the
//! process image with the configured command. The order is load
//! bearing: propagation is sealed before anything is mounted, the root
//! changes before paths inside the jail are touched, and the
//! environment is rebuilt last so the exec'd program sees exactly the
//! configured variables and nothing from the host.
//!
//! The first failing step aborts the sequence, and the resulting
//! [`Error::Setup`] names that step, so the parent's log tells apart a
//! hostname refusal from a missing rootfs from an exec of a program
//! the jail does not contain.

use std::path::Path;

use brig_common::config::{ContainerEnv, LaunchConfig};
use brig_common::constants;
use brig_common::error::{Error, Result, SetupStep};

use crate::sys::{SpecialFs, Sys};

/// Exit status of a child whose setup or exec failed.
const CHILD_FAILURE: i32 = 1;

/// Runs the full setup sequence and hands the process over to the
/// configured command.
///
/// On success control does not return here: the process image has been
/// replaced. An `Ok` can only be observed through a recording backend.
///
/// # Errors
///
/// Returns [`Error::Setup`] naming the first step that failed; later
/// steps are not attempted.
pub fn enter(sys: &dyn Sys, config: &LaunchConfig) -> Result<()> {
    seal_mount_propagation(sys)?;
    assume_identity(sys, &config.hostname)?;
    enter_rootfs(sys, &config.rootfs)?;
    mount_proc(sys)?;
    reset_environment(sys, &config.env)?;
    exec_command(sys, config)
}

/// Body of the jailed child process.
///
/// Translates the outcome of [`enter`] into the child's exit status: a
/// failed setup is reported on the child's stderr and turned into a
/// nonzero exit, never a panic.
#[must_use]
pub fn child_main(sys: &dyn Sys, config: &LaunchConfig) -> i32 {
    match enter(sys, config) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "jail setup failed");
            CHILD_FAILURE
        }
    }
}

/// Remounts the mount tree private so mount events stay inside the
/// child's namespace instead of leaking to the host table.
fn seal_mount_propagation(sys: &dyn Sys) -> Result<()> {
    sys.make_mount_private()
        .map_err(|e| Error::setup(SetupStep::RootPrivate, e))?;
    tracing::debug!("mount propagation sealed");
    Ok(())
}

fn assume_identity(sys: &dyn Sys, hostname: &str) -> Result<()> {
    sys.set_host_identity(hostname)
        .map_err(|e| Error::setup(SetupStep::Hostname, e))?;
    tracing::debug!(hostname, "hostname set");
    Ok(())
}

/// Confines the child to the rootfs and lands it at the jail's root.
///
/// The working directory change matters: without it the process keeps
/// a handle to a directory outside the new root.
fn enter_rootfs(sys: &dyn Sys, rootfs: &Path) -> Result<()> {
    sys.confine_root(rootfs)
        .map_err(|e| Error::setup(SetupStep::Chroot, e))?;
    sys.set_workdir(Path::new("/"))
        .map_err(|e| Error::setup(SetupStep::Workdir, e))?;
    tracing::debug!(rootfs = %rootfs.display(), "root changed");
    Ok(())
}

/// Mounts a fresh procfs for the child's pid namespace, so process
/// listings inside the jail show the jail's processes only.
fn mount_proc(sys: &dyn Sys) -> Result<()> {
    sys.mount_special(SpecialFs::Proc, Path::new(constants::PROC_MOUNT_POINT))
        .map_err(|e| Error::setup(SetupStep::MountProc, e))?;
    tracing::debug!("procfs mounted");
    Ok(())
}

/// Discards every inherited variable, then sets exactly the configured
/// triple in delivery order.
fn reset_environment(sys: &dyn Sys, env: &ContainerEnv) -> Result<()> {
    sys.scrub_env()
        .map_err(|e| Error::setup(SetupStep::ResetEnv, e))?;
    for (name, value) in env.pairs() {
        sys.set_env_var(name, value)
            .map_err(|e| Error::setup(SetupStep::ResetEnv, e))?;
    }
    tracing::debug!("environment reset");
    Ok(())
}

fn exec_command(sys: &dyn Sys, config: &LaunchConfig) -> Result<()> {
    let argv = config.argv();
    tracing::debug!(command = %config.command.display(), "handing over to the jailed command");
    sys.exec(&config.command, &argv)
        .map_err(|e| Error::setup(SetupStep::Exec, e))
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::PathBuf;

    use brig_common::config::LaunchConfig;
    use brig_common::error::SetupStep;

    use super::*;
    use crate::sys::fake::{FakeOp, FakeSys, SysCall};

    fn config() -> LaunchConfig {
        let mut config = LaunchConfig::new("/srv/jail");
        config.hostname = "box".to_owned();
        config
    }

    #[test]
    fn successful_setup_runs_every_step_in_order() {
        let fake = FakeSys::new();
        enter(&fake, &config()).expect("all fake steps succeed");
        assert_eq!(
            fake.call_names(),
            [
                "make_mount_private",
                "set_host_identity",
                "confine_root",
                "set_workdir",
                "mount_special",
                "scrub_env",
                "set_env_var",
                "set_env_var",
                "set_env_var",
                "exec",
            ]
        );
    }

    #[test]
    fn child_exits_zero_when_every_step_succeeds() {
        let fake = FakeSys::new();
        assert_eq!(child_main(&fake, &config()), 0);
    }

    #[test]
    fn environment_is_exactly_the_configured_triple() {
        let fake = FakeSys::new();
        enter(&fake, &config()).expect("all fake steps succeed");
        let env_calls: Vec<SysCall> = fake
            .calls()
            .into_iter()
            .filter(|call| matches!(call, SysCall::SetEnvVar { .. }))
            .collect();
        assert_eq!(
            env_calls,
            [
                SysCall::SetEnvVar {
                    name: "PATH".to_owned(),
                    value: "/bin:/usr/bin".to_owned(),
                },
                SysCall::SetEnvVar {
                    name: "HOME".to_owned(),
                    value: "/".to_owned(),
                },
                SysCall::SetEnvVar {
                    name: "TERM".to_owned(),
                    value: "xterm".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn scrub_happens_before_any_variable_is_set() {
        let fake = FakeSys::new();
        enter(&fake, &config()).expect("all fake steps succeed");
        let names = fake.call_names();
        let scrub = names
            .iter()
            .position(|&n| n == "scrub_env")
            .expect("scrub_env recorded");
        let first_set = names
            .iter()
            .position(|&n| n == "set_env_var")
            .expect("set_env_var recorded");
        assert!(scrub < first_set);
    }

    #[test]
    fn exec_receives_the_command_as_argv0() {
        let fake = FakeSys::new();
        let mut config = config();
        config.command = PathBuf::from("/bin/busybox");
        config.args = vec!["sh".to_owned()];
        enter(&fake, &config).expect("all fake steps succeed");
        let last = fake.calls().pop().expect("exec recorded");
        assert_eq!(
            last,
            SysCall::Exec {
                program: PathBuf::from("/bin/busybox"),
                argv: vec![OsString::from("/bin/busybox"), OsString::from("sh")],
            }
        );
    }

    #[test]
    fn chroot_failure_stops_the_sequence_at_the_chroot() {
        let fake = FakeSys::new();
        fake.fail_with(FakeOp::ConfineRoot, libc::ENOENT);
        let err = enter(&fake, &config()).expect_err("chroot armed to fail");
        assert_eq!(err.setup_step(), Some(SetupStep::Chroot));
        // The attempt is logged; nothing after it ran.
        assert_eq!(
            fake.call_names(),
            ["make_mount_private", "set_host_identity", "confine_root"]
        );
    }

    #[test]
    fn env_var_failure_is_reported_as_the_reset_step() {
        let fake = FakeSys::new();
        fake.fail_with(FakeOp::SetEnvVar, libc::EINVAL);
        let err = enter(&fake, &config()).expect_err("env set armed to fail");
        assert_eq!(err.setup_step(), Some(SetupStep::ResetEnv));
    }

    #[test]
    fn every_setup_failure_names_its_step() {
        let cases = [
            (FakeOp::MountPrivate, SetupStep::RootPrivate),
            (FakeOp::HostIdentity, SetupStep::Hostname),
            (FakeOp::ConfineRoot, SetupStep::Chroot),
            (FakeOp::Workdir, SetupStep::Workdir),
            (FakeOp::MountSpecial, SetupStep::MountProc),
            (FakeOp::ScrubEnv, SetupStep::ResetEnv),
            (FakeOp::SetEnvVar, SetupStep::ResetEnv),
            (FakeOp::Exec, SetupStep::Exec),
        ];
        for (op, step) in cases {
            let fake = FakeSys::new();
            fake.fail_with(op, libc::EPERM);
            let err = enter(&fake, &config()).expect_err("armed op must fail the setup");
            assert_eq!(err.setup_step(), Some(step), "failure at {op:?}");
        }
    }

    #[test]
    fn failed_exec_makes_the_child_exit_nonzero() {
        let fake = FakeSys::new();
        fake.fail_with(FakeOp::Exec, libc::ENOENT);
        assert_eq!(child_main(&fake, &config()), 1);
    }
}
