// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::PathBuf;

/// Determine default absolute path to the tool-private data directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/reskin` as the default
/// absolute path. Every target gets its own backup slot in here, so backups
/// always live outside of the tree the target application scans. Does not
/// check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("reskin"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the settings file.
///
/// Uses `$XDG_CONFIG_HOME/reskin/config.toml`. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("reskin").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default launcher data directory holding versioned installs.
///
/// This is the primary installation mechanism searched by the locator.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_launcher_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join(".minecraft_bedrock").join("versions"))
        .ok_or(NoWayHome)
}

/// Determine default system-managed package directory.
///
/// Only consulted when the launcher directory cannot be enumerated at all.
pub fn default_package_dir() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\WindowsApps")
    } else {
        PathBuf::from("/opt/WindowsApps")
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::data_dir`](https://docs.rs/dirs/latest/dirs/fn.data_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
