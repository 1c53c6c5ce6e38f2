//! Default paths, names, and sizes for a launch.
//!
//! Everything here can be overridden through [`crate::config::LaunchConfig`];
//! these are the values used when nothing else is configured.

/// Default root filesystem path consumed by the chroot jail.
///
/// The directory must be prepared by an external tool; see the rootfs
/// contract documented on `brig_runtime::launcher`.
pub const DEFAULT_ROOTFS: &str = "/var/lib/brig/rootfs";

/// Default hostname set inside the container's UTS namespace.
pub const DEFAULT_HOSTNAME: &str = "brig";

/// Default command search path delivered to the jailed process.
pub const DEFAULT_ENV_PATH: &str = "/bin:/usr/bin";

/// Default home directory delivered to the jailed process.
pub const DEFAULT_ENV_HOME: &str = "/";

/// Default terminal type delivered to the jailed process.
pub const DEFAULT_ENV_TERM: &str = "xterm";

/// Default program executed inside the jail.
pub const DEFAULT_COMMAND: &str = "/bin/sh";

/// Default size of the child's call stack, in bytes (1 MiB).
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Maximum hostname length accepted by the kernel (`HOST_NAME_MAX`).
pub const HOST_NAME_MAX: usize = 64;

/// Mount point of the process-information filesystem inside the jail.
pub const PROC_MOUNT_POINT: &str = "/proc";

/// Application name used in log output.
pub const APP_NAME: &str = "brig";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "brig";
