// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reversible asset overlays for third-party application installs.
//!
//! Reskin replaces the mutable asset tree of an installed application with a
//! patched copy, and can put the original back on demand. A pristine backup
//! is always taken out of band before the live tree is touched, so a target
//! is never left in a state that is neither original nor fully overlaid.
//!
//! # Flow
//!
//! 1. [`locate::Locator`] finds installations and picks one.
//! 2. [`session::AccessSession`] pairs it with the access strategy its
//!    installation mechanism requires.
//! 3. [`overlay::Overlay`] installs or uninstalls, with
//!    [`backup::BackupStore`] guarding the pristine copy and
//!    [`transform::Transform`] producing the patched tree.

pub mod access;
pub mod archive;
pub mod backup;
pub mod config;
pub mod locate;
pub mod overlay;
pub mod path;
pub mod process;
pub mod session;
pub mod transform;
