//! # brig-common
//!
//! Shared error types, launch configuration, and constants used across the
//! brig workspace.
//!
//! This crate is the leaf of the dependency graph — it depends on no other
//! internal crate and stays free of syscall wrappers: OS errors are carried
//! as plain [`std::io::Error`] values so that every other crate can agree
//! on one error vocabulary.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
