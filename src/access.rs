// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree access strategies.
//!
//! Every mutation of a target tree goes through a [`TreeAccess`]
//! implementation. Two strategies exist:
//!
//! 1. [`Direct`] uses ordinary file system calls.
//! 2. [`Forced`] delegates each primitive to an external unlock-capable
//!    helper, for trees that are owned or locked by another principal such
//!    that ordinary calls are denied.
//!
//! Which one applies is a property of how the target was installed. It is
//! never a retry ladder where forced access kicks in after direct access
//! fails.
//!
//! # Forced Access Pitfalls
//!
//! The helper accepts a bounded number of paths per invocation, so large file
//! sets are handed over in fixed-size batches. The first failing batch aborts
//! the rest.
//!
//! The helper can force a copy of an existing directory into a protected
//! parent, but it cannot force a bare directory creation through one. So
//! directories are created by staging the missing directory chain in a
//! scratch location, force copying its top into the deepest existing
//! ancestor, and removing the scratch copy afterwards.

use crate::archive::Archive;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{copy, create_dir_all, read_dir, remove_dir_all, rename, write},
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Duration,
};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

/// Which access strategy a target requires.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// Ordinary file system calls.
    #[default]
    Direct,

    /// External unlock-capable helper.
    Forced,
}

impl Display for AccessKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Direct => fmt.write_str("direct"),
            Self::Forced => fmt.write_str("forced"),
        }
    }
}

/// Capability set for mutating a directory tree.
pub trait TreeAccess: Send + Sync {
    /// Strategy this implementation represents.
    fn kind(&self) -> AccessKind;

    /// Copy contents of `src` into `dst`, creating `dst` as needed.
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Delete tree at `path`. Deleting a missing tree is not an error.
    fn delete_tree(&self, path: &Path) -> Result<()>;

    /// Rename tree at `old` to `new_name` within the same parent.
    fn rename_tree(&self, old: &Path, new_name: &str) -> Result<()>;

    /// Create directory at `path` if absent, along with missing parents.
    fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Write file content at `path`. Parent directory must already exist.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Materialize archive at `dest`.
    ///
    /// Defaults to unpacking entry by entry through this strategy.
    fn apply_archive(&self, archive: &Archive, dest: &Path) -> crate::archive::Result<()> {
        archive.unpack(dest, self)
    }
}

/// Access through ordinary file system calls.
#[derive(Debug, Default, Clone)]
pub struct Direct {
    tolerate_partial: bool,
}

impl Direct {
    /// Construct new direct access that aborts on the first failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct new direct access that skips entries it fails to copy.
    ///
    /// Skipped entries are logged as warnings. Only copies are affected,
    /// every other primitive still aborts on failure.
    pub fn tolerating_partial_copies() -> Self {
        Self {
            tolerate_partial: true,
        }
    }

    fn copy_entries(&self, src: &Path, dst: &Path) -> Result<()> {
        let (files, dirs) = list_dir(src)?;
        for file in files {
            let target = dst.join(file_name(&file));
            if let Err(err) = copy(&file, &target) {
                let err = Error::CopyFile {
                    source: err,
                    from: file.clone(),
                    to: target,
                };
                if !self.tolerate_partial {
                    return Err(err);
                }
                warn!("skip entry: {err}");
            }
        }

        for dir in dirs {
            let target = dst.join(file_name(&dir));
            let result = self
                .ensure_dir(&target)
                .and_then(|_| self.copy_entries(&dir, &target));
            if let Err(err) = result {
                if !self.tolerate_partial {
                    return Err(err);
                }
                warn!("skip entry: {err}");
            }
        }

        Ok(())
    }
}

impl TreeAccess for Direct {
    fn kind(&self) -> AccessKind {
        AccessKind::Direct
    }

    #[instrument(skip(self, src, dst), level = "debug")]
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()> {
        debug!("copy {:?} to {:?}", src.display(), dst.display());
        self.ensure_dir(dst)?;
        self.copy_entries(src, dst)
    }

    fn delete_tree(&self, path: &Path) -> Result<()> {
        debug!("delete {:?}", path.display());
        match remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Delete {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }

    fn rename_tree(&self, old: &Path, new_name: &str) -> Result<()> {
        let new = sibling(old, new_name);
        debug!("rename {:?} to {:?}", old.display(), new.display());
        rename(old, &new).map_err(|err| Error::Rename {
            source: err,
            path: old.to_path_buf(),
            new_name: new_name.to_string(),
        })
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        create_dir_all(path).map_err(|err| Error::CreateDir {
            source: err,
            path: path.to_path_buf(),
        })
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        write(path, bytes).map_err(|err| Error::WriteFile {
            source: err,
            path: path.to_path_buf(),
        })
    }
}

/// Single request handed to the forced-access helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperCall {
    /// Copy every source path into destination directory.
    Copy {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },

    /// Delete every target path.
    Delete { targets: Vec<PathBuf> },

    /// Rename target path to new name within the same parent.
    Rename { target: PathBuf, new_name: String },
}

impl Display for HelperCall {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Copy {
                sources,
                destination,
            } => write!(
                fmt,
                "copy {} path(s) into {:?}",
                sources.len(),
                destination.display()
            ),
            Self::Delete { targets } => write!(fmt, "delete {} path(s)", targets.len()),
            Self::Rename { target, new_name } => {
                write!(fmt, "rename {:?} to {new_name:?}", target.display())
            }
        }
    }
}

/// Layer of indirection for invoking the forced-access helper.
pub trait HelperRunner: Send + Sync {
    /// Check that the helper can be invoked at all.
    fn is_present(&self) -> bool;

    /// Perform one synchronous helper round trip.
    fn invoke(&self, call: &HelperCall) -> Result<()>;
}

/// Forced-access helper invoked as external process.
///
/// Sub-commands are passed as `/Copy`, `/Delete`, and `/Rename` followed by
/// their path arguments, each as a separate argument.
#[derive(Debug, Clone)]
pub struct UnlockerProcess {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl UnlockerProcess {
    /// Construct new helper process runner.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Impose deadline on every invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn expand_args(call: &HelperCall) -> Vec<String> {
        let mut args = Vec::new();
        match call {
            HelperCall::Copy {
                sources,
                destination,
            } => {
                args.push("/Copy".into());
                args.extend(sources.iter().map(|path| path.to_string_lossy().into_owned()));
                args.push(destination.to_string_lossy().into_owned());
            }
            HelperCall::Delete { targets } => {
                args.push("/Delete".into());
                args.extend(targets.iter().map(|path| path.to_string_lossy().into_owned()));
            }
            HelperCall::Rename { target, new_name } => {
                args.push("/Rename".into());
                args.push(target.to_string_lossy().into_owned());
                args.push(new_name.clone());
            }
        }

        args
    }

    /// Run helper, killing it once `deadline` passes.
    ///
    /// Stderr is drained while the helper runs, so a chatty helper never
    /// stalls on a full pipe.
    fn wait_with_deadline(&self, call: &HelperCall, deadline: Duration) -> Result<()> {
        let spawn_error = |err: std::io::Error| Error::HelperSpawn {
            source: err,
            program: self.program.clone(),
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(spawn_error)?;

        runtime.block_on(async {
            let child = tokio::process::Command::new(&self.program)
                .args(Self::expand_args(call))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(spawn_error)?;

            // INVARIANT: Dropping the timed out future kills the helper.
            let output = tokio::time::timeout(deadline, child.wait_with_output())
                .await
                .map_err(|_| Error::AccessToolTimeout {
                    program: self.program.clone(),
                    call: call.to_string(),
                    secs: deadline.as_secs(),
                })?
                .map_err(spawn_error)?;
            let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

            check_status(
                &self.program,
                call,
                output.status.code(),
                output.status.success(),
                stderr,
            )
        })
    }
}

impl HelperRunner for UnlockerProcess {
    fn is_present(&self) -> bool {
        self.program.is_file()
    }

    #[instrument(skip(self, call), level = "debug")]
    fn invoke(&self, call: &HelperCall) -> Result<()> {
        debug!("helper {:?}: {call}", self.program.display());
        if let Some(deadline) = self.timeout {
            return self.wait_with_deadline(call, deadline);
        }

        let output = Command::new(&self.program)
            .args(Self::expand_args(call))
            .stdin(Stdio::null())
            .output()
            .map_err(|err| Error::HelperSpawn {
                source: err,
                program: self.program.clone(),
            })?;
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

        check_status(
            &self.program,
            call,
            output.status.code(),
            output.status.success(),
            stderr,
        )
    }
}

fn check_status(
    program: &Path,
    call: &HelperCall,
    code: Option<i32>,
    success: bool,
    stderr: String,
) -> Result<()> {
    if success {
        return Ok(());
    }

    // INVARIANT: Chomp trailing newlines.
    let stderr = stderr.trim_end().to_string();
    Err(Error::HelperFailed {
        program: program.to_path_buf(),
        call: call.to_string(),
        code,
        stderr,
    })
}

/// Access through an external unlock-capable helper.
#[derive(Debug)]
pub struct Forced<R = UnlockerProcess>
where
    R: HelperRunner,
{
    runner: R,
    batch_size: usize,
    scratch: PathBuf,
}

impl<R> Forced<R>
where
    R: HelperRunner,
{
    /// Construct new forced access.
    ///
    /// The `scratch` directory must be writable through ordinary calls. It
    /// is used to stage directories and files before the helper moves them
    /// into place. A zero `batch_size` is treated as one.
    pub fn new(runner: R, batch_size: usize, scratch: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            batch_size: batch_size.max(1),
            scratch: scratch.into(),
        }
    }

    /// Reference to underlying helper runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Create fresh uniquely named staging directory.
    ///
    /// The directory is removed when the returned handle drops.
    fn stage(&self) -> Result<TempDir> {
        let root = self.scratch.join("staging");
        create_dir_all(&root).map_err(|err| Error::Stage {
            source: err,
            path: root.clone(),
        })?;

        tempfile::Builder::new()
            .prefix("staging")
            .tempdir_in(&root)
            .map_err(|err| Error::Stage {
                source: err,
                path: root.clone(),
            })
    }
}

impl<R> TreeAccess for Forced<R>
where
    R: HelperRunner,
{
    fn kind(&self) -> AccessKind {
        AccessKind::Forced
    }

    #[instrument(skip(self, src, dst), level = "debug")]
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()> {
        debug!("forced copy {:?} to {:?}", src.display(), dst.display());
        self.ensure_dir(dst)?;
        let (files, dirs) = list_dir(src)?;

        for batch in files.chunks(self.batch_size) {
            self.runner.invoke(&HelperCall::Copy {
                sources: batch.to_vec(),
                destination: dst.to_path_buf(),
            })?;
        }

        for dir in dirs {
            self.copy_tree(&dir, &dst.join(file_name(&dir)))?;
        }

        Ok(())
    }

    fn delete_tree(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        self.runner.invoke(&HelperCall::Delete {
            targets: vec![path.to_path_buf()],
        })
    }

    fn rename_tree(&self, old: &Path, new_name: &str) -> Result<()> {
        self.runner.invoke(&HelperCall::Rename {
            target: old.to_path_buf(),
            new_name: new_name.to_string(),
        })
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return Ok(());
        }

        let Some(base) = path.ancestors().find(|ancestor| ancestor.is_dir()) else {
            return Err(Error::NoExistingAncestor {
                path: path.to_path_buf(),
            });
        };
        let missing = path.strip_prefix(base).unwrap_or(path);
        let Some(top) = missing.components().next() else {
            return Ok(());
        };

        // INVARIANT: Stage the whole missing chain so one forced copy creates it.
        let staging = self.stage()?;
        create_dir_all(staging.path().join(missing)).map_err(|err| Error::Stage {
            source: err,
            path: staging.path().join(missing),
        })?;

        self.runner.invoke(&HelperCall::Copy {
            sources: vec![staging.path().join(top)],
            destination: base.to_path_buf(),
        })
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Err(Error::NoExistingAncestor {
                path: path.to_path_buf(),
            });
        };

        let staging = self.stage()?;
        let staged = staging.path().join(file_name(path));
        write(&staged, bytes).map_err(|err| Error::Stage {
            source: err,
            path: staged.clone(),
        })?;

        self.runner.invoke(&HelperCall::Copy {
            sources: vec![staged],
            destination: parent.to_path_buf(),
        })
    }

    /// Materialize archive at `dest`.
    ///
    /// Unpacks the archive into the scratch area with ordinary calls first,
    /// then force copies the result into place in batches. This keeps the
    /// number of helper invocations proportional to directory count instead
    /// of file count.
    fn apply_archive(&self, archive: &Archive, dest: &Path) -> crate::archive::Result<()> {
        info!("stage {} entries for forced copy", archive.len());
        let staging = self.stage()?;
        let staged = staging.path().join("tree");
        archive.unpack(&staged, &Direct::new())?;
        self.copy_tree(&staged, dest)?;

        Ok(())
    }
}

/// Split directory listing into sorted files and sorted subdirectories.
fn list_dir(path: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let entries = read_dir(path).map_err(|err| Error::ReadDir {
        source: err,
        path: path.to_path_buf(),
    })?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| Error::ReadDir {
            source: err,
            path: path.to_path_buf(),
        })?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            dirs.push(entry_path);
        } else {
            files.push(entry_path);
        }
    }
    files.sort();
    dirs.sort();

    Ok((files, dirs))
}

fn file_name(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Access strategy error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Directory cannot be enumerated.
    #[error("failed to read directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    CopyFile {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write file {:?}", path.display())]
    WriteFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Tree cannot be deleted.
    #[error("failed to delete {:?}", path.display())]
    Delete {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Tree cannot be renamed.
    #[error("failed to rename {:?} to {new_name:?}", path.display())]
    Rename {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        new_name: String,
    },

    /// Scratch staging area cannot be prepared.
    #[error("failed to stage {:?} for forced access", path.display())]
    Stage {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Path has no existing ancestor to materialize it under.
    #[error("no existing ancestor for {:?}", path.display())]
    NoExistingAncestor { path: PathBuf },

    /// Helper process cannot be spawned or waited on.
    #[error("failed to run access helper {:?}", program.display())]
    HelperSpawn {
        #[source]
        source: std::io::Error,
        program: PathBuf,
    },

    /// Helper process reports failure.
    #[error("access helper {:?} failed to {call} (exit code {code:?}): {stderr}", program.display())]
    HelperFailed {
        program: PathBuf,
        call: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Helper process exceeds its deadline.
    #[error("access helper {:?} timed out after {secs}s trying to {call}", program.display())]
    AccessToolTimeout {
        program: PathBuf,
        call: String,
        secs: u64,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{fs::read_to_string, sync::Mutex};

    /// Helper runner that performs calls with ordinary file system calls.
    ///
    /// Records every call, and can be told to fail a specific invocation.
    #[derive(Debug, Default)]
    pub(crate) struct FakeHelper {
        pub(crate) calls: Mutex<Vec<HelperCall>>,
        pub(crate) fail_at: Option<usize>,
    }

    impl FakeHelper {
        pub(crate) fn failing_at(index: usize) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_at: Some(index),
            }
        }

        pub(crate) fn calls(&self) -> Vec<HelperCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HelperRunner for FakeHelper {
        fn is_present(&self) -> bool {
            true
        }

        fn invoke(&self, call: &HelperCall) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push(call.clone());
            if self.fail_at == Some(index) {
                return Err(Error::HelperFailed {
                    program: PathBuf::from("fake-helper"),
                    call: call.to_string(),
                    code: Some(1),
                    stderr: "simulated failure".into(),
                });
            }

            let direct = Direct::new();
            match call {
                HelperCall::Copy {
                    sources,
                    destination,
                } => {
                    for source in sources {
                        let target = destination.join(file_name(source));
                        if source.is_dir() {
                            direct.copy_tree(source, &target)?;
                        } else {
                            copy(source, &target).map_err(|err| Error::CopyFile {
                                source: err,
                                from: source.clone(),
                                to: target.clone(),
                            })?;
                        }
                    }
                }
                HelperCall::Delete { targets } => {
                    for target in targets {
                        direct.delete_tree(target)?;
                    }
                }
                HelperCall::Rename { target, new_name } => direct.rename_tree(target, new_name)?,
            }

            Ok(())
        }
    }

    fn copy_calls(helper: &FakeHelper) -> Vec<usize> {
        helper
            .calls()
            .iter()
            .filter_map(|call| match call {
                HelperCall::Copy { sources, .. } => Some(sources.len()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn forced_copy_chunks_into_batches() -> anyhow::Result<()> {
        let src = tempfile::tempdir()?;
        let dst = tempfile::tempdir()?;
        let scratch = tempfile::tempdir()?;
        for index in 0..120 {
            write(src.path().join(format!("file{index:03}.txt")), format!("{index}"))?;
        }

        let forced = Forced::new(FakeHelper::default(), 50, scratch.path());
        forced.copy_tree(src.path(), dst.path())?;

        assert_eq!(copy_calls(forced.runner()), vec![50, 50, 20]);
        assert_eq!(forced.runner().calls().len(), 3);
        assert_eq!(read_to_string(dst.path().join("file119.txt"))?, "119");

        Ok(())
    }

    #[test]
    fn forced_copy_aborts_on_first_failed_batch() -> anyhow::Result<()> {
        let src = tempfile::tempdir()?;
        let dst = tempfile::tempdir()?;
        let scratch = tempfile::tempdir()?;
        for index in 0..120 {
            write(src.path().join(format!("file{index:03}.txt")), "x")?;
        }

        let forced = Forced::new(FakeHelper::failing_at(1), 50, scratch.path());
        let result = forced.copy_tree(src.path(), dst.path());

        assert!(matches!(result, Err(Error::HelperFailed { .. })));
        assert_eq!(copy_calls(forced.runner()), vec![50, 50]);
        assert!(!dst.path().join("file119.txt").exists());

        Ok(())
    }

    #[test]
    fn forced_ensure_dir_stages_missing_chain() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let scratch = tempfile::tempdir()?;
        let target = root.path().join("locked/data/gui");

        let forced = Forced::new(FakeHelper::default(), 50, scratch.path());
        forced.ensure_dir(&target)?;

        assert!(target.is_dir());
        let calls = forced.runner().calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            HelperCall::Copy {
                sources,
                destination,
            } => {
                assert_eq!(destination, &root.path().to_path_buf());
                assert_eq!(sources.len(), 1);
                assert_eq!(file_name(&sources[0]), "locked");
            }
            call => panic!("unexpected helper call {call:?}"),
        }

        // INVARIANT: Scratch copies are cleaned up.
        let leftovers = read_dir(scratch.path().join("staging"))?.count();
        assert_eq!(leftovers, 0);

        // Existing directories need no helper round trip.
        forced.ensure_dir(&target)?;
        assert_eq!(forced.runner().calls().len(), 1);

        Ok(())
    }

    #[test]
    fn forced_apply_archive_copies_staged_tree() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let scratch = tempfile::tempdir()?;
        let mut archive = Archive::new();
        archive.insert_file("index.html", "<html/>")?;
        archive.insert_file("dist/app.js", "app")?;
        archive.insert_dir("dist/empty")?;

        let forced = Forced::new(FakeHelper::default(), 50, scratch.path());
        let dest = root.path().join("gui");
        forced.apply_archive(&archive, &dest)?;

        assert_eq!(Archive::pack(&dest)?, archive);
        assert!(forced.runner().calls().len() >= 2);

        Ok(())
    }

    #[test]
    fn forced_delete_skips_missing_tree() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let forced = Forced::new(FakeHelper::default(), 50, scratch.path());
        forced.delete_tree(&scratch.path().join("nothing-here"))?;
        assert!(forced.runner().calls().is_empty());

        Ok(())
    }

    #[test]
    fn direct_copy_delete_rename() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let src = root.path().join("src");
        create_dir_all(src.join("nested/empty"))?;
        write(src.join("nested/file.txt"), "content")?;

        let direct = Direct::new();
        let dst = root.path().join("dst");
        direct.copy_tree(&src, &dst)?;
        assert_eq!(read_to_string(dst.join("nested/file.txt"))?, "content");
        assert!(dst.join("nested/empty").is_dir());

        direct.rename_tree(&dst, "moved")?;
        assert!(!dst.exists());
        assert!(root.path().join("moved/nested/file.txt").is_file());

        direct.delete_tree(&root.path().join("moved"))?;
        assert!(!root.path().join("moved").exists());
        direct.delete_tree(&root.path().join("moved"))?;

        Ok(())
    }

    #[test]
    fn direct_copy_aborts_on_missing_source() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let result = Direct::new().copy_tree(&root.path().join("absent"), &root.path().join("dst"));
        assert!(matches!(result, Err(Error::ReadDir { .. })));

        let result = Direct::tolerating_partial_copies()
            .copy_tree(&root.path().join("absent"), &root.path().join("dst2"));
        assert!(matches!(result, Err(Error::ReadDir { .. })));

        Ok(())
    }

    #[test]
    fn forced_staging_is_cleaned_after_failed_helper() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let scratch = tempfile::tempdir()?;
        let mut archive = Archive::new();
        archive.insert_file("dist/app.js", "app")?;

        let forced = Forced::new(FakeHelper::failing_at(0), 50, scratch.path());
        let result = forced.apply_archive(&archive, &root.path().join("locked/gui"));
        assert!(matches!(
            result,
            Err(crate::archive::Error::Access(Error::HelperFailed { .. }))
        ));

        let leftovers = read_dir(scratch.path().join("staging"))?.count();
        assert_eq!(leftovers, 0);

        Ok(())
    }

    #[cfg(unix)]
    fn helper_script(dir: &Path, body: &str) -> anyhow::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("unlocker.sh");
        write(&path, format!("#!/bin/sh\n{body}\n"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;

        Ok(path)
    }

    #[cfg(unix)]
    #[test]
    fn unlocker_process_drains_stderr_under_deadline() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let script = helper_script(root.path(), "head -c 200000 /dev/zero >&2\nexit 0")?;

        let helper = UnlockerProcess::new(script).with_timeout(Duration::from_secs(10));
        helper.invoke(&HelperCall::Delete {
            targets: vec![root.path().join("gui")],
        })?;

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unlocker_process_times_out() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let script = helper_script(root.path(), "sleep 5")?;

        let helper = UnlockerProcess::new(script).with_timeout(Duration::from_secs(1));
        let result = helper.invoke(&HelperCall::Delete {
            targets: vec![root.path().join("gui")],
        });
        assert!(matches!(result, Err(Error::AccessToolTimeout { secs: 1, .. })));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unlocker_process_reports_exit_failure() {
        let helper = UnlockerProcess::new("/bin/false");
        let result = helper.invoke(&HelperCall::Delete {
            targets: vec![PathBuf::from("/nonexistent")],
        });
        assert!(matches!(result, Err(Error::HelperFailed { .. })));
    }
}
