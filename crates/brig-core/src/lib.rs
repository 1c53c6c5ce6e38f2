//! # brig-core
//!
//! Low-level Linux isolation primitives for the brig launcher.
//!
//! This crate provides the two halves of a launch:
//! - **Syscall seam**: the [`sys::Sys`] trait abstracts every kernel
//!   interaction, with a real Linux backend and an in-memory fake for
//!   tests.
//! - **Jail setup**: the [`entry`] module runs the ordered isolation
//!   steps inside the newly created child, from sealing mount
//!   propagation through replacing the process image.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! proper error handling and `// SAFETY:` documentation.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod entry;
pub mod sys;
