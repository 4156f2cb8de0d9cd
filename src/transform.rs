// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Transform seam.
//!
//! A __transform__ turns a pristine archive into a patched archive. How it
//! does so is none of our business: the overlay controller hands over the
//! archive plus an opaque settings table, and gets back the patched archive
//! with a report. Failures of individual items are listed in the report,
//! only a returned error aborts an install.
//!
//! [`CommandTransform`] runs an external program for this. The archive is
//! unpacked into a scratch directory, the program is handed input, output,
//! settings, and report paths, and whatever it leaves in the output
//! directory becomes the patched archive.

use crate::{access::Direct, archive::Archive, config::TransformCommand};

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{create_dir_all, read_to_string, write},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Summary of what a transform did.
///
/// Counts are informational. A non-empty failure map means a partial
/// success, never a reason to roll back.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformReport {
    /// Entries present only in the patched archive.
    pub added: u64,

    /// Entries present only in the pristine archive.
    pub removed: u64,

    /// Entries whose content changed.
    pub modified: u64,

    /// Entries left untouched.
    pub unmodified: u64,

    /// Entries edited in place by the transform.
    pub edited: u64,

    /// Entries renamed by the transform.
    pub renamed: u64,

    /// Total number of file entries in the patched archive.
    pub total_entries: u64,

    /// Replacements that failed, keyed by file name.
    pub failed_replaces: BTreeMap<String, Vec<String>>,
}

impl TransformReport {
    /// Compute report by comparing file entries of two archives.
    ///
    /// Edits and renames are only known to a transform itself, so both stay
    /// at zero here.
    pub fn diff(before: &Archive, after: &Archive) -> Self {
        let old = before.files().collect::<BTreeMap<_, _>>();
        let new = after.files().collect::<BTreeMap<_, _>>();
        let paths = old.keys().chain(new.keys()).collect::<BTreeSet<_>>();

        let mut report = Self {
            total_entries: new.len() as u64,
            ..Default::default()
        };
        for path in paths {
            match (old.get(path), new.get(path)) {
                (Some(a), Some(b)) if a == b => report.unmodified += 1,
                (Some(_), Some(_)) => report.modified += 1,
                (None, Some(_)) => report.added += 1,
                (Some(_), None) => report.removed += 1,
                (None, None) => {}
            }
        }

        report
    }

    /// Check if any replacement failed.
    pub fn has_failures(&self) -> bool {
        !self.failed_replaces.is_empty()
    }
}

/// Patched archive along with report of what changed.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Patched archive.
    pub archive: Archive,

    /// Report of what changed.
    pub report: TransformReport,
}

/// Layer of indirection for the transform step.
pub trait Transform: Send + Sync {
    /// Name of transform recorded in the overlay marker.
    fn name(&self) -> String;

    /// Version of transform, if it has one.
    fn version(&self) -> Option<String> {
        None
    }

    /// Turn pristine archive into patched archive.
    fn apply(&self, archive: Archive, settings: &toml::Table) -> Result<Transformed>;
}

/// Transform performed by an external program.
///
/// The program is invoked as
/// `<program> [args]... <input-dir> <output-dir> <settings.toml> <report.toml>`.
/// It must exit successfully and leave the patched tree in the output
/// directory. Writing the report file is optional, a missing report is
/// computed by diffing input and output.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    command: TransformCommand,
    scratch: PathBuf,
}

impl CommandTransform {
    /// Construct new external program transform.
    pub fn new(command: TransformCommand, scratch: impl Into<PathBuf>) -> Self {
        Self {
            command,
            scratch: scratch.into(),
        }
    }

    fn run(&self, archive: &Archive, settings: &toml::Table, work: &Path) -> Result<Transformed> {
        let input = work.join("input");
        let output = work.join("output");
        let settings_path = work.join("settings.toml");
        let report_path = work.join("report.toml");

        archive.unpack(&input, &Direct::new())?;
        create_dir_all(&output).map_err(|err| Error::Workspace {
            source: err,
            path: output.clone(),
        })?;
        let settings_text = toml::ser::to_string_pretty(settings)?;
        write(&settings_path, settings_text).map_err(|err| Error::Workspace {
            source: err,
            path: settings_path.clone(),
        })?;

        let program = &self.command.program;
        info!("run transform {:?}", program.display());
        let output_status = Command::new(program)
            .args(&self.command.args)
            .arg(&input)
            .arg(&output)
            .arg(&settings_path)
            .arg(&report_path)
            .output()
            .map_err(|err| Error::Spawn {
                source: err,
                program: program.clone(),
            })?;
        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(output_status.stderr.as_slice());
            return Err(Error::Failed {
                program: program.clone(),
                code: output_status.status.code(),
                stderr: stderr.trim_end().to_string(),
            });
        }

        let patched = Archive::pack(&output)?;
        let report = if report_path.is_file() {
            let text = read_to_string(&report_path).map_err(|err| Error::Workspace {
                source: err,
                path: report_path.clone(),
            })?;
            toml::de::from_str(&text)?
        } else {
            debug!("no report written, diff archives instead");
            TransformReport::diff(archive, &patched)
        };

        Ok(Transformed {
            archive: patched,
            report,
        })
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> String {
        self.command
            .program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.command.program.to_string_lossy().into_owned())
    }

    #[instrument(skip(self, archive, settings), level = "debug")]
    fn apply(&self, archive: Archive, settings: &toml::Table) -> Result<Transformed> {
        create_dir_all(&self.scratch).map_err(|err| Error::Workspace {
            source: err,
            path: self.scratch.clone(),
        })?;
        let work = tempfile::Builder::new()
            .prefix("transform")
            .tempdir_in(&self.scratch)
            .map_err(|err| Error::Workspace {
                source: err,
                path: self.scratch.clone(),
            })?;

        self.run(&archive, settings, work.path())
    }
}

/// Transform error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Scratch workspace cannot be prepared or read.
    #[error("failed to prepare transform workspace at {:?}", path.display())]
    Workspace {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Transform program cannot be spawned.
    #[error("failed to run transform {:?}", program.display())]
    Spawn {
        #[source]
        source: std::io::Error,
        program: PathBuf,
    },

    /// Transform program reports failure.
    #[error("transform {:?} failed (exit code {code:?}): {stderr}", program.display())]
    Failed {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// Transform settings cannot be serialized.
    #[error(transparent)]
    Settings(#[from] toml::ser::Error),

    /// Transform report cannot be parsed.
    #[error(transparent)]
    Report(#[from] toml::de::Error),

    /// Archive cannot be packed or unpacked.
    #[error(transparent)]
    Archive(#[from] crate::archive::Error),

    /// Any other failure raised by a transform implementation.
    #[error("{0}")]
    Other(String),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
