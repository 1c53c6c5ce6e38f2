//! Launch configuration model.
//!
//! A [`LaunchConfig`] is constructed once, validated, and then never
//! mutated: the launcher and the jailed child both read from the same
//! immutable value for the whole lifetime of a launch attempt.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::constants;
use crate::error::{Error, Result};

/// Which kernel namespaces to request for the child.
///
/// The flags are applied atomically as part of process creation, so there
/// is no window in which the child exists outside its namespaces.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespaces {
    /// Isolate hostname and domain name (UTS namespace).
    pub uts: bool,
    /// Isolate process IDs; the child becomes PID 1 in its namespace.
    pub pid: bool,
    /// Isolate the mount table, enabling a private filesystem view.
    pub mount: bool,
    /// Isolate the network stack.
    pub net: bool,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
            net: true,
        }
    }
}

impl Namespaces {
    /// Returns a set with no namespaces requested.
    ///
    /// The child then shares every resource class with the host; useful
    /// for exercising the process lifecycle without privilege.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            uts: false,
            pid: false,
            mount: false,
            net: false,
        }
    }
}

/// The fixed environment delivered to the jailed process.
///
/// Exactly three variables exist inside the jail: a command search path,
/// a home directory, and a terminal type. Everything inherited from the
/// host is discarded before these are set, so no host-specific detail
/// leaks through the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEnv {
    /// Value for `PATH`.
    pub path: String,
    /// Value for `HOME`.
    pub home: String,
    /// Value for `TERM`.
    pub term: String,
}

impl Default for ContainerEnv {
    fn default() -> Self {
        Self {
            path: constants::DEFAULT_ENV_PATH.to_owned(),
            home: constants::DEFAULT_ENV_HOME.to_owned(),
            term: constants::DEFAULT_ENV_TERM.to_owned(),
        }
    }
}

impl ContainerEnv {
    /// Returns the variables as `(name, value)` pairs in delivery order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("PATH", self.path.as_str()),
            ("HOME", self.home.as_str()),
            ("TERM", self.term.as_str()),
        ]
    }
}

/// Immutable description of a single launch attempt.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Namespaces requested at process creation.
    pub namespaces: Namespaces,
    /// Path to the prepared root filesystem the child is confined to.
    pub rootfs: PathBuf,
    /// Hostname set inside the child's UTS namespace.
    pub hostname: String,
    /// Environment delivered to the exec'd process.
    pub env: ContainerEnv,
    /// Program executed inside the jail, as a path valid *inside* it.
    pub command: PathBuf,
    /// Arguments passed to the program (argv[0] is the program itself).
    pub args: Vec<String>,
    /// Size in bytes of the child's call stack.
    pub stack_size: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self::new(constants::DEFAULT_ROOTFS)
    }
}

impl LaunchConfig {
    /// Creates a configuration for the given rootfs with default values
    /// everywhere else: all namespaces on, the stock hostname and
    /// environment, `/bin/sh` as the target, and a 1 MiB stack.
    #[must_use]
    pub fn new(rootfs: impl Into<PathBuf>) -> Self {
        Self {
            namespaces: Namespaces::default(),
            rootfs: rootfs.into(),
            hostname: constants::DEFAULT_HOSTNAME.to_owned(),
            env: ContainerEnv::default(),
            command: PathBuf::from(constants::DEFAULT_COMMAND),
            args: Vec::new(),
            stack_size: constants::DEFAULT_STACK_SIZE,
        }
    }

    /// Returns the full argument vector for the exec step.
    ///
    /// By convention argv[0] is the program path itself, followed by the
    /// configured arguments.
    #[must_use]
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.command.clone().into_os_string());
        argv.extend(self.args.iter().map(OsString::from));
        argv
    }

    /// Checks that the configuration is well formed.
    ///
    /// Only the values themselves are validated; filesystem state is not
    /// inspected here. A missing or incomplete rootfs surfaces inside the
    /// child at the chroot or exec step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the hostname is empty, exceeds the
    /// kernel limit, or contains a NUL byte; if the command is empty; or
    /// if the stack size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(Error::Config {
                message: "hostname must not be empty".into(),
            });
        }
        if self.hostname.len() > constants::HOST_NAME_MAX {
            return Err(Error::Config {
                message: format!(
                    "hostname exceeds {} bytes: {:?}",
                    constants::HOST_NAME_MAX,
                    self.hostname
                ),
            });
        }
        if self.hostname.bytes().any(|b| b == 0) {
            return Err(Error::Config {
                message: "hostname contains a NUL byte".into(),
            });
        }
        if self.command.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "command must not be empty".into(),
            });
        }
        if self.stack_size == 0 {
            return Err(Error::Config {
                message: "stack size must not be zero".into(),
            });
        }
        Ok(())
    }
}
