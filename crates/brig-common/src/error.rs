//! Unified error types for the brig workspace.
//!
//! The launcher and the jailed child fail in structurally different ways:
//! launcher-side errors ([`Error::Spawn`], [`Error::Reap`]) are fatal to the
//! whole program, while a setup failure ([`Error::Setup`]) is fatal only to
//! the child, which reports it on stderr and exits nonzero. No error value
//! ever crosses the process boundary.

use std::fmt;
use std::io;

use thiserror::Error;

/// Identity of a step in the child's isolation sequence.
///
/// Carried by [`Error::Setup`] so a failure names exactly where the
/// sequence stopped. The variants are listed in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    /// Recursive-private remount of `/`, cutting mount propagation.
    RootPrivate,
    /// `sethostname(2)` inside the new UTS namespace.
    Hostname,
    /// `chroot(2)` into the configured root filesystem.
    Chroot,
    /// `chdir(2)` to `/` inside the jail.
    Workdir,
    /// Mount of the process-information filesystem at `/proc`.
    MountProc,
    /// Discarding the inherited environment and setting the fixed variables.
    ResetEnv,
    /// `execv(2)` of the configured target.
    Exec,
}

impl SetupStep {
    /// Returns the step's stable diagnostic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RootPrivate => "make-root-private",
            Self::Hostname => "set-hostname",
            Self::Chroot => "chroot",
            Self::Workdir => "chdir",
            Self::MountProc => "mount-proc",
            Self::ResetEnv => "reset-env",
            Self::Exec => "exec",
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum Error {
    /// The combined process-creation-and-namespace call failed.
    ///
    /// Typically insufficient privilege or an exhausted kernel namespace
    /// limit. Fatal to the launcher.
    #[error("failed to create isolated process: {source}")]
    Spawn {
        /// Underlying OS error.
        source: io::Error,
    },

    /// Waiting for the child failed.
    ///
    /// This is an error in the wait call itself, not a nonzero child exit
    /// (which is a normal outcome). Fatal to the launcher.
    #[error("failed to reap container process: {source}")]
    Reap {
        /// Underlying OS error.
        source: io::Error,
    },

    /// A step of the child's isolation sequence failed.
    ///
    /// Fatal to the child only; the launcher observes a terminated child.
    #[error("container setup failed at {step}: {source}")]
    Setup {
        /// The step that failed.
        step: SetupStep,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The launch configuration is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The current platform cannot run isolated processes.
    #[error("platform not supported: {message}")]
    Unsupported {
        /// Description of the missing capability.
        message: String,
    },
}

impl Error {
    /// Builds a [`Error::Setup`] for the given step and OS error.
    #[must_use]
    pub const fn setup(step: SetupStep, source: io::Error) -> Self {
        Self::Setup { step, source }
    }

    /// Returns the failing setup step, if this is a setup error.
    #[must_use]
    pub const fn setup_step(&self) -> Option<SetupStep> {
        match self {
            Self::Setup { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_error_names_the_failing_step() {
        let err = Error::setup(SetupStep::MountProc, io::ErrorKind::PermissionDenied.into());
        let msg = err.to_string();
        assert!(msg.contains("mount-proc"), "message was: {msg}");
        assert_eq!(err.setup_step(), Some(SetupStep::MountProc));
    }

    #[test]
    fn non_setup_errors_carry_no_step() {
        let err = Error::Config {
            message: "empty command".into(),
        };
        assert_eq!(err.setup_step(), None);
    }

    #[test]
    fn step_names_are_distinct() {
        let steps = [
            SetupStep::RootPrivate,
            SetupStep::Hostname,
            SetupStep::Chroot,
            SetupStep::Workdir,
            SetupStep::MountProc,
            SetupStep::ResetEnv,
            SetupStep::Exec,
        ];
        for (i, a) in steps.iter().enumerate() {
            for b in &steps[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
            }
        }
    }
}
