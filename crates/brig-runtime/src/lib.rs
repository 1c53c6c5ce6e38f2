//! # brig-runtime
//!
//! The parent side of a launch: reserve a stack, create the child inside
//! its namespaces, block until it terminates, reap it, and run best-effort
//! mount cleanup.
//!
//! The launcher is strictly synchronous — exactly one parent/child pair,
//! no threads, no task queue. Child-side failures are never launcher
//! errors: the launcher observes a terminated child and proceeds to
//! cleanup regardless of how the child ended.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cleanup;
pub mod launcher;

pub use cleanup::{CleanupOutcome, CleanupWarning};
pub use launcher::Child;
