// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pristine backup management.
//!
//! Before anything touches a live tree, a pristine copy of it must exist out
//! of band. Existence of that copy is the single source of truth for whether
//! an overlay is currently installed on a target.
//!
//! # Storage Layout
//!
//! Backups live in a tool-private data directory with one slot per target,
//! keyed by the basename of the target installation:
//!
//! ```text
//! <data-dir>/
//! ├── VERSION
//! ├── scratch/
//! └── <target-basename>/
//!     ├── last-used.toml
//!     └── gui_vanilla_backup/
//! ```
//!
//! A backup is first copied into `gui_vanilla_backup.partial`, then renamed
//! into place. So a backup that exists is always complete, and a leftover
//! partial copy from an interrupted run is simply discarded.
//!
//! # Legacy Backups
//!
//! Older releases kept the pristine copy right next to the live tree, inside
//! the target installation. Such a copy is migrated into the private slot the
//! next time a backup is ensured, and is still honored by uninstall if it was
//! never migrated.

use crate::{
    access::{Direct, TreeAccess},
    locate::TargetCandidate,
    session::AccessSession,
};

use serde::{Deserialize, Serialize};
use std::{
    fs::{read_dir, read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Name of backup directory, both in private slots and legacy locations.
pub const BACKUP_DIR_NAME: &str = "gui_vanilla_backup";

/// Name of per-target version marker file.
pub const LAST_USED_FILE: &str = "last-used.toml";

/// Name of data directory version marker file.
pub const VERSION_FILE: &str = "VERSION";

const PARTIAL_SUFFIX: &str = ".partial";

/// Where a backup is stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackupLocation {
    /// Private slot in the tool's data directory.
    Private,

    /// Sibling of the live tree left by an older release.
    Legacy,
}

/// How [`BackupStore::ensure_backup`] came by its backup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackupOrigin {
    /// Backup already existed, nothing was written.
    Existing,

    /// Legacy backup was moved into the private slot.
    Migrated,

    /// Live tree was copied into the private slot.
    Created,
}

/// Out-of-band pristine copy of a live tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Live tree this backup corresponds to.
    pub source: PathBuf,

    /// Directory holding the pristine copy.
    pub storage: PathBuf,

    /// Where the pristine copy is kept.
    pub location: BackupLocation,
}

/// Marker recording which tool version last touched a target.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionMarker {
    /// Version of this tool.
    pub tool_version: String,

    /// Name of transform last applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,

    /// Version of transform last applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_version: Option<String>,
}

impl VersionMarker {
    /// Construct new marker stamped with the current tool version.
    pub fn current(transform: Option<String>, transform_version: Option<String>) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").into(),
            transform,
            transform_version,
        }
    }
}

/// Backup slots of the tool-private data directory.
#[derive(Debug, Clone)]
pub struct BackupStore {
    data_dir: PathBuf,
}

impl BackupStore {
    /// Construct new backup store rooted at `data_dir`.
    ///
    /// Nothing is created until a backup is ensured.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root of tool-private data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Scratch area for staging and transform workspaces.
    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join("scratch")
    }

    /// Private slot of `candidate`.
    pub fn slot_dir(&self, candidate: &TargetCandidate) -> PathBuf {
        self.data_dir.join(candidate.basename())
    }

    /// Expected storage path of the private backup of `candidate`.
    pub fn storage_path(&self, candidate: &TargetCandidate) -> PathBuf {
        self.slot_dir(candidate).join(BACKUP_DIR_NAME)
    }

    /// Location of backup left inside the installation by older releases.
    pub fn legacy_path(&self, candidate: &TargetCandidate) -> PathBuf {
        let live = candidate.live_tree();
        match live.parent() {
            Some(parent) => parent.join(BACKUP_DIR_NAME),
            None => live.join(BACKUP_DIR_NAME),
        }
    }

    /// Make sure a pristine backup of the session's live tree exists.
    ///
    /// An existing private backup is returned untouched. Otherwise a legacy
    /// backup is migrated if present, or the live tree is copied verbatim.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Access`] if copying, renaming, or deleting fails.
    ///   The private slot never holds an incomplete backup afterwards.
    #[instrument(skip(self, session), level = "debug")]
    pub fn ensure_backup(&self, session: &AccessSession) -> Result<(BackupRecord, BackupOrigin)> {
        let candidate = session.candidate();
        let storage = self.storage_path(candidate);
        let record = BackupRecord {
            source: candidate.live_tree(),
            storage: storage.clone(),
            location: BackupLocation::Private,
        };

        if storage.is_dir() {
            debug!("backup already exists at {:?}", storage.display());
            return Ok((record, BackupOrigin::Existing));
        }

        let legacy = self.legacy_path(candidate);
        let (source, origin) = if legacy.is_dir() {
            info!("migrate legacy backup {:?}", legacy.display());
            (legacy.clone(), BackupOrigin::Migrated)
        } else {
            info!("back up {:?}", record.source.display());
            (record.source.clone(), BackupOrigin::Created)
        };

        let direct = Direct::new();
        let partial = partial_path(&storage);
        direct.ensure_dir(&self.slot_dir(candidate))?;
        direct.delete_tree(&partial)?;
        session.access().copy_tree(&source, &partial)?;
        direct.rename_tree(&partial, BACKUP_DIR_NAME)?;

        // INVARIANT: Legacy copy goes away only once the private copy is in place.
        if origin == BackupOrigin::Migrated {
            session.access().delete_tree(&legacy)?;
        }

        Ok((record, origin))
    }

    /// Find existing backup of `candidate`.
    ///
    /// Prefers the private slot over a legacy backup. A backup that exists
    /// but cannot be enumerated is an error, not an absence.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Unreadable`] if the backup directory cannot be read.
    pub fn load_backup(&self, candidate: &TargetCandidate) -> Result<Option<BackupRecord>> {
        let private = BackupRecord {
            source: candidate.live_tree(),
            storage: self.storage_path(candidate),
            location: BackupLocation::Private,
        };
        let legacy = BackupRecord {
            source: candidate.live_tree(),
            storage: self.legacy_path(candidate),
            location: BackupLocation::Legacy,
        };

        for record in [private, legacy] {
            match read_dir(&record.storage) {
                Ok(_) => {
                    debug!("found {:?} backup {:?}", record.location, record.storage.display());
                    return Ok(Some(record));
                }
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(Error::Unreadable {
                        source: err,
                        path: record.storage,
                    })
                }
            }
        }

        Ok(None)
    }

    /// Delete backup, only ever after a confirmed restore.
    ///
    /// Legacy backups live inside the target, so they are deleted through
    /// the session's access strategy.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Access`] if deletion fails.
    pub fn discard_backup(&self, session: &AccessSession, record: &BackupRecord) -> Result<()> {
        info!("discard backup {:?}", record.storage.display());
        match record.location {
            BackupLocation::Private => Direct::new().delete_tree(&record.storage)?,
            BackupLocation::Legacy => session.access().delete_tree(&record.storage)?,
        }

        Ok(())
    }

    /// Record which tool and transform versions last touched `candidate`.
    ///
    /// # Errors
    ///
    /// - Return [`Error::WriteMarker`] if either marker file cannot be
    ///   written.
    pub fn write_version_marker(
        &self,
        candidate: &TargetCandidate,
        marker: &VersionMarker,
    ) -> Result<()> {
        let slot = self.slot_dir(candidate);
        Direct::new().ensure_dir(&slot)?;

        let path = slot.join(LAST_USED_FILE);
        write(&path, toml::ser::to_string(marker)?).map_err(|err| Error::WriteMarker {
            source: err,
            path: path.clone(),
        })?;

        let path = self.data_dir.join(VERSION_FILE);
        write(&path, format!("{}\n", marker.tool_version)).map_err(|err| Error::WriteMarker {
            source: err,
            path: path.clone(),
        })
    }

    /// Read version marker of `candidate`, if any.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ReadMarker`] if the marker exists but cannot be read.
    /// - Return [`Error::MarkerFormat`] if the marker cannot be parsed.
    pub fn read_version_marker(&self, candidate: &TargetCandidate) -> Result<Option<VersionMarker>> {
        let path = self.slot_dir(candidate).join(LAST_USED_FILE);
        match read_to_string(&path) {
            Ok(text) => Ok(Some(toml::de::from_str(&text)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                warn!("version marker {:?} unreadable", path.display());
                Err(Error::ReadMarker { source: err, path })
            }
        }
    }
}

fn partial_path(storage: &Path) -> PathBuf {
    let mut name = storage
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    storage.with_file_name(name)
}

/// Backup management error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backup exists but cannot be enumerated.
    #[error("backup {:?} exists but cannot be read", path.display())]
    Unreadable {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Version marker cannot be written.
    #[error("failed to write version marker {:?}", path.display())]
    WriteMarker {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Version marker cannot be read.
    #[error("failed to read version marker {:?}", path.display())]
    ReadMarker {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Version marker cannot be parsed.
    #[error(transparent)]
    MarkerFormat(#[from] toml::de::Error),

    /// Version marker cannot be serialized.
    #[error(transparent)]
    MarkerSerialize(#[from] toml::ser::Error),

    /// Access primitive fails.
    #[error(transparent)]
    Access(#[from] crate::access::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
