// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Overlay state machine.
//!
//! A target is either __uninstalled__, i.e., its live tree is pristine, or
//! __overlaid__, i.e., its live tree was replaced by a patched tree. The
//! [`Overlay`] controller moves targets between these two states.
//!
//! # Install
//!
//! 1. Make sure a pristine backup exists.
//! 2. Pack the backup, never the live tree, which may hold a partial overlay
//!    of an earlier failed run.
//! 3. Hand the archive to a [`Transform`].
//! 4. Replace the live tree with the patched archive.
//!
//! Installing again on an overlaid target refreshes the overlay from the
//! existing backup. Transform failures of single items are reported back,
//! they never roll anything back.
//!
//! # Uninstall
//!
//! 1. Refuse if the target application is running.
//! 2. Confirm the backup exists and is readable.
//! 3. Delete the live tree.
//! 4. Copy the backup into its place.
//! 5. Discard the backup.
//!
//! Steps never reorder. If any step fails, the backup survives.
//!
//! # Overlay Marker
//!
//! Install writes a small marker file at the root of the overlaid tree. It
//! records what produced the overlay and with which settings. Its presence is
//! the sign that a tree is overlaid even when no backup can be found.

use crate::{
    archive::Archive,
    backup::{BackupLocation, BackupOrigin, BackupRecord, BackupStore, VersionMarker},
    config::HelperSettings,
    locate::{Locator, Selector, TargetCandidate},
    process::ProcessQuery,
    session::AccessSession,
    transform::{Transform, TransformReport},
};

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Name of marker file placed at the root of an overlaid tree.
pub const MARKER_FILE: &str = "reskin-overlay.toml";

/// Marker describing an installed overlay.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct OverlayMarker {
    /// Version of this tool that installed the overlay.
    pub tool_version: String,

    /// Name of transform that produced the overlay.
    pub transform: String,

    /// Version of transform that produced the overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_version: Option<String>,

    /// Settings the transform was given.
    #[serde(default)]
    pub settings: toml::Table,
}

/// State of a target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Uninstalled,
    Overlaid,
}

impl Display for OverlayState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Uninstalled => fmt.write_str("uninstalled"),
            Self::Overlaid => fmt.write_str("overlaid"),
        }
    }
}

/// Snapshot of a target's overlay state.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// Current state.
    pub state: OverlayState,

    /// Existing backup, if any.
    pub backup: Option<BackupRecord>,

    /// Overlay marker of live tree, if any.
    pub marker: Option<OverlayMarker>,

    /// Tool and transform versions that last touched the target, if any.
    pub last_used: Option<VersionMarker>,
}

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    /// Live tree that was overlaid.
    pub live_tree: PathBuf,

    /// How the pristine backup was obtained.
    pub origin: BackupOrigin,

    /// What the transform did.
    pub report: TransformReport,
}

/// Outcome of a successful uninstall.
#[derive(Debug, Clone, PartialEq)]
pub struct UninstallReport {
    /// Live tree that was restored.
    pub live_tree: PathBuf,

    /// Backup the live tree was restored from.
    pub restored_from: BackupRecord,
}

/// Overlay controller.
#[derive(Debug)]
pub struct Overlay<P>
where
    P: ProcessQuery,
{
    backups: BackupStore,
    processes: P,
    process_name: String,
    bar: ProgressBar,
}

impl<P> Overlay<P>
where
    P: ProcessQuery,
{
    /// Construct new overlay controller.
    ///
    /// The `process_name` is the executable name of the target application,
    /// checked through `processes` before exclusive operations.
    pub fn new(backups: BackupStore, processes: P, process_name: impl Into<String>) -> Self {
        Self {
            backups,
            processes,
            process_name: process_name.into(),
            bar: ProgressBar::hidden(),
        }
    }

    /// Report phase changes through progress bar.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.bar = bar;
        self
    }

    /// Backup store in use.
    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Find installations through `locator` and pick one with `selector`.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Locate`] if nothing is found or the selection is
    ///   invalid.
    pub fn resolve(&self, locator: &Locator, selector: &impl Selector) -> Result<TargetCandidate> {
        Ok(locator.resolve(selector)?)
    }

    /// Open access session on `candidate`.
    ///
    /// Forced access stages its scratch copies in the scratch area of the
    /// backup store.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Session`] if forced access is required but the
    ///   helper is missing.
    pub fn open_session(&self, candidate: TargetCandidate, helper: &HelperSettings) -> Result<AccessSession> {
        Ok(AccessSession::open(candidate, helper, self.backups.scratch_dir())?)
    }

    /// Determine state of `candidate` without touching anything.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Backup`] if an existing backup or version marker
    ///   cannot be read.
    /// - Return [`Error::ReadMarker`] or [`Error::MarkerFormat`] if the
    ///   overlay marker is corrupt.
    pub fn status(&self, candidate: &TargetCandidate) -> Result<Status> {
        let backup = self.backups.load_backup(candidate)?;
        let marker = read_marker(&candidate.live_tree())?;
        let last_used = self.backups.read_version_marker(candidate)?;
        let state = if backup.is_some() || marker.is_some() {
            OverlayState::Overlaid
        } else {
            OverlayState::Uninstalled
        };

        Ok(Status {
            state,
            backup,
            marker,
            last_used,
        })
    }

    /// Overlay the session's live tree with the output of `transform`.
    ///
    /// # Errors
    ///
    /// - Return [`Error::BackupMissing`] if the live tree is already overlaid
    ///   but has no backup. Nothing is mutated.
    /// - Return [`Error::Transform`] if the transform fails as a whole. The
    ///   live tree is untouched at that point.
    /// - Return [`Error::Access`] or [`Error::Archive`] if replacing the live
    ///   tree fails. The backup survives, so uninstall can recover.
    #[instrument(skip(self, session, transform, settings), level = "debug")]
    pub fn install(
        &self,
        session: &AccessSession,
        transform: &impl Transform,
        settings: &toml::Table,
    ) -> Result<InstallReport> {
        let candidate = session.candidate();
        let live = session.live_tree();
        if self.processes.is_running(&self.process_name) {
            warn!(
                "{} is running, it may need a restart to pick up the overlay",
                self.process_name
            );
        }

        // INVARIANT: Never back up an overlaid tree as if it were pristine.
        if self.backups.load_backup(candidate)?.is_none() && is_overlaid(&live) {
            return Err(Error::BackupMissing {
                live,
                expected: self.backups.storage_path(candidate),
            });
        }

        self.bar.set_message("backing up pristine tree");
        let (record, origin) = self.backups.ensure_backup(session)?;

        self.bar.set_message("packing pristine tree");
        let pristine = Archive::pack(&record.storage)?;

        self.bar.set_message(format!("running transform {}", transform.name()));
        let mut patched = transform.apply(pristine, settings)?;
        if patched.report.has_failures() {
            for (file, failures) in &patched.report.failed_replaces {
                warn!("{file}: {} replacement(s) failed", failures.len());
            }
        }

        let marker = OverlayMarker {
            tool_version: env!("CARGO_PKG_VERSION").into(),
            transform: transform.name(),
            transform_version: transform.version(),
            settings: settings.clone(),
        };
        patched
            .archive
            .insert_file(MARKER_FILE, toml::ser::to_string_pretty(&marker)?)?;

        self.bar.set_message("replacing live tree");
        info!("overlay {:?}", live.display());
        session.access().delete_tree(&live)?;
        session.access().apply_archive(&patched.archive, &live)?;

        self.backups.write_version_marker(
            candidate,
            &VersionMarker::current(Some(marker.transform), marker.transform_version),
        )?;
        self.bar.set_message("install complete");

        Ok(InstallReport {
            live_tree: live,
            origin,
            report: patched.report,
        })
    }

    /// Restore the session's live tree from its backup.
    ///
    /// # Errors
    ///
    /// - Return [`Error::TargetBusy`] if the target application is running.
    /// - Return [`Error::NotInstalled`] if there is no backup and the live tree
    ///   shows no sign of an overlay.
    /// - Return [`Error::BackupMissing`] if the live tree is overlaid but there
    ///   is no backup to restore from.
    /// - Return [`Error::Access`] if deleting or restoring fails. The backup
    ///   is never discarded in that case.
    ///
    /// Nothing is mutated for the first three.
    #[instrument(skip(self, session), level = "debug")]
    pub fn uninstall(&self, session: &AccessSession) -> Result<UninstallReport> {
        let candidate = session.candidate();
        let live = session.live_tree();
        if self.processes.is_running(&self.process_name) {
            return Err(Error::TargetBusy {
                process: self.process_name.clone(),
            });
        }

        self.bar.set_message("checking backup");
        let Some(record) = self.backups.load_backup(candidate)? else {
            if is_overlaid(&live) {
                return Err(Error::BackupMissing {
                    live,
                    expected: self.backups.storage_path(candidate),
                });
            }
            return Err(Error::NotInstalled { live });
        };

        self.bar.set_message("removing overlay");
        info!("restore {:?} from {:?}", live.display(), record.storage.display());
        session.access().delete_tree(&live)?;

        self.bar.set_message("restoring pristine tree");
        match record.location {
            BackupLocation::Private => {
                session.access().copy_tree(&record.storage, &live)?;
                self.backups.discard_backup(session, &record)?;
            }
            BackupLocation::Legacy => {
                // INVARIANT: Renaming consumes the legacy copy in one step.
                let name = live
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                session.access().rename_tree(&record.storage, &name)?;
            }
        }
        self.bar.set_message("uninstall complete");

        Ok(UninstallReport {
            live_tree: live,
            restored_from: record,
        })
    }

    /// Write transform settings recorded in the overlay marker of
    /// `candidate` to `dest`.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotInstalled`] if the live tree has no marker.
    /// - Return [`Error::Export`] if `dest` cannot be written.
    pub fn export_settings(&self, candidate: &TargetCandidate, dest: &Path) -> Result<OverlayMarker> {
        let live = candidate.live_tree();
        let Some(marker) = read_marker(&live)? else {
            return Err(Error::NotInstalled { live });
        };

        let text = toml::ser::to_string_pretty(&marker.settings)?;
        write(dest, text).map_err(|err| Error::Export {
            source: err,
            path: dest.to_path_buf(),
        })?;
        info!("exported settings of {:?} to {:?}", live.display(), dest.display());

        Ok(marker)
    }
}

/// Read overlay marker at root of `live` tree.
///
/// Returns `None` if no marker exists.
///
/// # Errors
///
/// - Return [`Error::ReadMarker`] if the marker exists but cannot be read.
/// - Return [`Error::MarkerFormat`] if the marker cannot be parsed.
pub fn read_marker(live: &Path) -> Result<Option<OverlayMarker>> {
    let path = live.join(MARKER_FILE);
    match read_to_string(&path) {
        Ok(text) => Ok(Some(toml::de::from_str(&text)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::ReadMarker { source: err, path }),
    }
}

fn is_overlaid(live: &Path) -> bool {
    live.join(MARKER_FILE).is_file()
}

/// Overlay error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Target application is running.
    #[error("{process} is running, close it before uninstalling")]
    TargetBusy { process: String },

    /// Live tree is overlaid, but no backup exists to restore from.
    #[error(
        "{:?} is overlaid but no backup exists at {:?}; refusing to guess, restore the original assets \
        manually (e.g., copy a known {} directory into place or reinstall the application)",
        live.display(),
        expected.display(),
        crate::backup::BACKUP_DIR_NAME
    )]
    BackupMissing { live: PathBuf, expected: PathBuf },

    /// Target has no backup and no sign of an overlay.
    #[error("no overlay is installed on {:?}", live.display())]
    NotInstalled { live: PathBuf },

    /// Overlay marker cannot be read.
    #[error("failed to read overlay marker {:?}", path.display())]
    ReadMarker {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Overlay marker cannot be parsed.
    #[error(transparent)]
    MarkerFormat(#[from] toml::de::Error),

    /// Overlay marker or settings cannot be serialized.
    #[error(transparent)]
    MarkerSerialize(#[from] toml::ser::Error),

    /// Exported settings cannot be written.
    #[error("failed to export settings to {:?}", path.display())]
    Export {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Target cannot be found or selected.
    #[error(transparent)]
    Locate(#[from] crate::locate::Error),

    /// Access session cannot be opened.
    #[error(transparent)]
    Session(#[from] crate::session::Error),

    #[error(transparent)]
    Backup(#[from] crate::backup::Error),

    #[error(transparent)]
    Archive(#[from] crate::archive::Error),

    #[error(transparent)]
    Access(#[from] crate::access::Error),

    #[error(transparent)]
    Transform(#[from] crate::transform::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
