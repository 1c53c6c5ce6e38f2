//! # brig — single-container namespace launcher
//!
//! Launches one isolated shell: fresh UTS/PID/mount/network namespaces,
//! a chroot jail over a prepared root filesystem, a scrubbed
//! environment, then hands the terminal to the jailed command and waits
//! for it.
//!
//! The process exits `0` when its own operations (create, reap)
//! succeeded, even if the jailed command failed — the child's outcome
//! is reported through the logs, not the launcher's exit code.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Context;
use brig_common::config::LaunchConfig;
use brig_common::constants;
use brig_core::sys::host_sys;
use brig_runtime::{cleanup, launcher};
use clap::Parser;

/// Launch an isolated shell inside a prepared root filesystem.
///
/// The rootfs must already contain the command (and, if it is
/// dynamically linked, its loader and libraries) plus an empty /proc
/// directory; brig does not prepare rootfs contents itself.
#[derive(Parser, Debug)]
#[command(name = constants::BIN_NAME, version, about)]
struct Cli {
    /// Prepared root filesystem the container is confined to.
    #[arg(long, env = "BRIG_ROOTFS", default_value = constants::DEFAULT_ROOTFS)]
    rootfs: PathBuf,

    /// Hostname inside the container.
    #[arg(long, env = "BRIG_HOSTNAME", default_value = constants::DEFAULT_HOSTNAME)]
    hostname: String,

    /// Command to run inside the jail, with its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    /// Folds the parsed arguments into a launch configuration; an empty
    /// trailing command keeps the stock shell.
    fn into_config(self) -> LaunchConfig {
        let mut config = LaunchConfig::new(self.rootfs);
        config.hostname = self.hostname;
        let mut words = self.command.into_iter();
        if let Some(program) = words.next() {
            config.command = PathBuf::from(program);
            config.args = words.collect();
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_config();
    let sys = host_sys().context("this host cannot run isolated processes")?;

    let child = launcher::launch(sys.as_ref(), &config)
        .context("failed to create the container process")?;
    let status = launcher::wait(sys.as_ref(), child)
        .context("failed to reap the container process")?;
    if status.success() {
        tracing::info!(%status, "container finished");
    } else {
        tracing::warn!(%status, "container ended abnormally");
    }

    if let Err(warning) = cleanup::cleanup(sys.as_ref(), &config.rootfs) {
        tracing::warn!(%warning, "post-exit cleanup incomplete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_yields_the_stock_configuration() {
        let cli = Cli::try_parse_from(["brig"]).expect("bare invocation parses");
        let config = cli.into_config();
        assert_eq!(config.rootfs, PathBuf::from(constants::DEFAULT_ROOTFS));
        assert_eq!(config.hostname, constants::DEFAULT_HOSTNAME);
        assert_eq!(config.command, PathBuf::from(constants::DEFAULT_COMMAND));
        assert!(config.args.is_empty());
        config.validate().expect("stock configuration validates");
    }

    #[test]
    fn trailing_words_become_program_and_arguments() {
        let cli = Cli::try_parse_from([
            "brig",
            "--rootfs",
            "/srv/jail",
            "/bin/busybox",
            "sh",
            "-c",
            "true",
        ])
        .expect("flags then command parse");
        let config = cli.into_config();
        assert_eq!(config.rootfs, PathBuf::from("/srv/jail"));
        assert_eq!(config.command, PathBuf::from("/bin/busybox"));
        assert_eq!(config.args, ["sh", "-c", "true"]);
    }

    #[test]
    fn hostname_flag_overrides_the_default() {
        let cli = Cli::try_parse_from(["brig", "--hostname", "testbox"])
            .expect("hostname flag parses");
        assert_eq!(cli.into_config().hostname, "testbox");
    }
}
