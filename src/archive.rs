// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-memory archive of a directory tree.
//!
//! An __archive__ is the transfer format used to move an asset tree between
//! the file system and a transform. It is a hierarchy of named entries, where
//! each entry is either a directory or a file holding raw bytes. Archives are
//! independent of the host file system, so a transform can freely rewrite one
//! without touching the live tree.
//!
//! # Ordering
//!
//! Entry names are unique per directory level. Entries are kept sorted by
//! name, so traversal order is stable for any given archive no matter what
//! order the file system reported them in.

use crate::access::TreeAccess;

use std::{
    collections::BTreeMap,
    fs::{read, read_dir},
    path::{Component, Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Hierarchical container of named binary entries.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Archive {
    root: Directory,
}

/// Directory level of an archive.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Directory {
    entries: BTreeMap<String, Entry>,
}

/// Single archive entry.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Entry {
    /// Nested directory.
    Directory(Directory),

    /// File with its raw content.
    File(Vec<u8>),
}

impl Archive {
    /// Construct new empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack directory tree into archive.
    ///
    /// Recursively enumerates `path`. Every subdirectory becomes a directory
    /// entry, even empty ones, and every file becomes a file entry with its
    /// raw bytes. Relative path structure is preserved exactly.
    ///
    /// Symlinks are followed, so the archive holds the content they point
    /// to. Broken symlinks and entries that are neither directories nor
    /// regular files (sockets, FIFOs, device nodes) are skipped with a
    /// warning. Such entries are absent from the archive and do not come
    /// back on [`Archive::unpack`].
    ///
    /// # Errors
    ///
    /// - Return [`Error::ReadDir`] if a directory cannot be enumerated.
    /// - Return [`Error::ReadFile`] if a file cannot be read.
    /// - Return [`Error::NonUtf8Name`] if an entry name is not valid UTF-8.
    #[instrument(skip(path), level = "debug")]
    pub fn pack(path: impl AsRef<Path>) -> Result<Self> {
        debug!("pack {:?}", path.as_ref().display());
        let mut archive = Self::new();
        pack_dir(path.as_ref(), &mut archive.root)?;

        Ok(archive)
    }

    /// Unpack archive into directory tree.
    ///
    /// Creates `path` if absent, then recreates the structure of the archive
    /// underneath it. Directory entries are created if absent, and file
    /// entries are written through the write primitive of `access`. Parent
    /// directories always exist before a nested file is written.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Access`] if any access primitive fails.
    #[instrument(skip(self, path, access), level = "debug")]
    pub fn unpack<A>(&self, path: impl AsRef<Path>, access: &A) -> Result<()>
    where
        A: TreeAccess + ?Sized,
    {
        debug!("unpack {} entries into {:?}", self.len(), path.as_ref().display());
        access.ensure_dir(path.as_ref())?;
        for (relative, entry) in self.walk() {
            let full_path = path.as_ref().join(&relative);
            match entry {
                Entry::Directory(_) => access.ensure_dir(&full_path)?,
                Entry::File(bytes) => access.write_file(&full_path, bytes)?,
            }
        }

        Ok(())
    }

    /// Insert directory entry, creating intermediate directories.
    ///
    /// Inserting a directory that already exists is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`Error::InvalidPath`] if `path` is not a plain relative path.
    /// - Return [`Error::Conflict`] if a file occupies a component of `path`.
    pub fn insert_dir(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let names = split(path.as_ref())?;
        let mut current = &mut self.root;
        for (index, name) in names.iter().enumerate() {
            current = current.child_dir(name, path.as_ref(), index)?;
        }

        Ok(())
    }

    /// Insert file entry, creating intermediate directories.
    ///
    /// Replaces the content of an existing file entry at the same path.
    ///
    /// # Errors
    ///
    /// - Return [`Error::InvalidPath`] if `path` is not a plain relative path.
    /// - Return [`Error::Conflict`] if a directory already occupies `path`, or
    ///   a file occupies one of its parent components.
    pub fn insert_file(&mut self, path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let mut names = split(path.as_ref())?;
        let Some(file_name) = names.pop() else {
            return Err(Error::InvalidPath {
                path: path.as_ref().to_path_buf(),
            });
        };

        let mut current = &mut self.root;
        for (index, name) in names.iter().enumerate() {
            current = current.child_dir(name, path.as_ref(), index)?;
        }

        if let Some(Entry::Directory(_)) = current.entries.get(&file_name) {
            return Err(Error::Conflict {
                path: path.as_ref().to_path_buf(),
            });
        }
        current.entries.insert(file_name, Entry::File(bytes.into()));

        Ok(())
    }

    /// Remove entry at path, returning it if present.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> Option<Entry> {
        let mut names = split(path.as_ref()).ok()?;
        let last = names.pop()?;
        let mut current = &mut self.root;
        for name in names {
            match current.entries.get_mut(&name) {
                Some(Entry::Directory(dir)) => current = dir,
                _ => return None,
            }
        }

        current.entries.remove(&last)
    }

    /// Lookup entry at path.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&Entry> {
        let names = split(path.as_ref()).ok()?;
        let (last, parents) = names.split_last()?;
        let mut current = &self.root;
        for name in parents {
            match current.entries.get(name) {
                Some(Entry::Directory(dir)) => current = dir,
                _ => return None,
            }
        }

        current.entries.get(last)
    }

    /// Lookup file content at path.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        match self.get(path) {
            Some(Entry::File(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    /// List every entry with its relative path.
    ///
    /// Parents always come before their children, and siblings are listed in
    /// name order.
    pub fn walk(&self) -> Vec<(PathBuf, &Entry)> {
        let mut listing = Vec::new();
        walk_dir(&self.root, PathBuf::new(), &mut listing);
        listing
    }

    /// List every file with its relative path and content.
    pub fn files(&self) -> impl Iterator<Item = (PathBuf, &[u8])> {
        self.walk()
            .into_iter()
            .filter_map(|(path, entry)| match entry {
                Entry::File(bytes) => Some((path, bytes.as_slice())),
                Entry::Directory(_) => None,
            })
    }

    /// Total number of entries, directories included.
    pub fn len(&self) -> usize {
        self.walk().len()
    }

    /// Check if archive holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.root.entries.is_empty()
    }
}

impl Directory {
    fn child_dir(&mut self, name: &str, full: &Path, depth: usize) -> Result<&mut Directory> {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Entry::Directory(Directory::default()));

        match entry {
            Entry::Directory(dir) => Ok(dir),
            Entry::File(_) => Err(Error::Conflict {
                path: full.iter().take(depth + 1).collect(),
            }),
        }
    }
}

fn pack_dir(path: &Path, dir: &mut Directory) -> Result<()> {
    let entries = read_dir(path).map_err(|err| Error::ReadDir {
        source: err,
        path: path.to_path_buf(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|err| Error::ReadDir {
            source: err,
            path: path.to_path_buf(),
        })?;
        let entry_path = entry.path();
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| Error::NonUtf8Name {
                path: entry_path.clone(),
            })?;

        // INVARIANT: Follow symlinks so the archive holds real content.
        if entry_path.is_dir() {
            let mut child = Directory::default();
            pack_dir(&entry_path, &mut child)?;
            dir.entries.insert(name, Entry::Directory(child));
        } else if entry_path.is_file() {
            let bytes = read(&entry_path).map_err(|err| Error::ReadFile {
                source: err,
                path: entry_path.clone(),
            })?;
            dir.entries.insert(name, Entry::File(bytes));
        } else {
            warn!("skip unsupported entry {:?}", entry_path.display());
        }
    }

    Ok(())
}

fn walk_dir<'a>(dir: &'a Directory, prefix: PathBuf, listing: &mut Vec<(PathBuf, &'a Entry)>) {
    for (name, entry) in &dir.entries {
        let path = prefix.join(name);
        listing.push((path.clone(), entry));
        if let Entry::Directory(child) = entry {
            walk_dir(child, path, listing);
        }
    }
}

fn split(path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => match name.to_str() {
                Some(name) => names.push(name.to_string()),
                None => {
                    return Err(Error::NonUtf8Name {
                        path: path.to_path_buf(),
                    })
                }
            },
            Component::CurDir => continue,
            _ => {
                return Err(Error::InvalidPath {
                    path: path.to_path_buf(),
                })
            }
        }
    }

    if names.is_empty() {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
        });
    }

    Ok(names)
}

/// Archive error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Directory cannot be enumerated while packing.
    #[error("failed to read directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be read while packing.
    #[error("failed to read file {:?}", path.display())]
    ReadFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Entry path is absolute, empty, or escapes the archive root.
    #[error("invalid archive entry path {:?}", path.display())]
    InvalidPath { path: PathBuf },

    /// Entry name cannot be represented without loss.
    #[error("archive entry name {:?} is not valid UTF-8", path.display())]
    NonUtf8Name { path: PathBuf },

    /// File and directory entries collide at the same path.
    #[error("archive entry {:?} conflicts with existing entry", path.display())]
    Conflict { path: PathBuf },

    /// Access primitive fails while unpacking.
    #[error(transparent)]
    Access(#[from] crate::access::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
