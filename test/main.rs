// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use indoc::formatdoc;
use reskin::{
    access::Direct,
    archive::Archive,
    transform::{Transform, TransformReport, Transformed},
};
use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Fake launcher data directory holding installed versions.
pub(crate) struct LauncherFixture {
    root: TempDir,
}

impl LauncherFixture {
    pub(crate) fn new() -> Result<Self> {
        let root = tempfile::tempdir()?;
        create_dir_all(root.path().join("versions"))?;
        create_dir_all(root.path().join("data"))?;

        Ok(Self { root })
    }

    pub(crate) fn versions_dir(&self) -> PathBuf {
        self.root.path().join("versions")
    }

    pub(crate) fn packages_dir(&self) -> PathBuf {
        self.root.path().join("packages")
    }

    pub(crate) fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    /// Install a version with a manifest and a pristine asset tree.
    pub(crate) fn add_version(&self, guid: &str, kind: VersionKind, version: &str) -> Result<InstallFixture> {
        let path = self.versions_dir().join(guid);
        InstallFixture::new(path, kind, version)
    }

    /// Install a version into the system-managed package directory.
    pub(crate) fn add_package(&self, folder: &str, kind: VersionKind, version: &str) -> Result<InstallFixture> {
        let path = self.packages_dir().join(folder);
        InstallFixture::new(path, kind, version)
    }
}

/// One fake installation.
pub(crate) struct InstallFixture {
    pub(crate) path: PathBuf,
    pub(crate) pristine: Archive,
}

impl InstallFixture {
    fn new(path: PathBuf, kind: VersionKind, version: &str) -> Result<Self> {
        create_dir_all(&path)?;
        let (name, display) = kind.identity();
        write(
            path.join("AppxManifest.xml"),
            formatdoc! {r#"
                <?xml version="1.0" encoding="utf-8"?>
                <Package>
                  <Identity Name="{name}" Publisher="CN=Vendor" Version="{version}" />
                  <Properties>
                    <DisplayName>{display}</DisplayName>
                  </Properties>
                </Package>
            "#},
        )?;

        let mut pristine = Archive::new();
        pristine.insert_file("index.html", "<html>vanilla</html>")?;
        pristine.insert_file("dist/hud.js", "export const clock = true;")?;
        pristine.insert_file("dist/menu/start.js", "export const title = 'Play';")?;
        pristine.insert_dir("fonts")?;
        pristine.unpack(path.join("data/gui"), &Direct::new())?;

        Ok(Self { path, pristine })
    }

    pub(crate) fn live_tree(&self) -> PathBuf {
        self.path.join("data/gui")
    }

    pub(crate) fn snapshot(&self) -> Result<Archive> {
        Ok(Archive::pack(self.live_tree())?)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum VersionKind {
    Release,
    Preview,
}

impl VersionKind {
    fn identity(&self) -> (&'static str, &'static str) {
        match self {
            Self::Release => ("Microsoft.MinecraftUWP", "Minecraft for Windows"),
            Self::Preview => ("Microsoft.MinecraftWindowsBeta", "Minecraft Windows Preview"),
        }
    }
}

/// Transform that hides the clock and drops the start menu.
pub(crate) struct HideClock;

impl Transform for HideClock {
    fn name(&self) -> String {
        "hide-clock".into()
    }

    fn apply(&self, mut archive: Archive, settings: &toml::Table) -> reskin::transform::Result<Transformed> {
        let before = archive.clone();
        let value = settings
            .get("clock")
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        archive.insert_file("dist/hud.js", format!("export const clock = {value};"))?;
        archive.remove("dist/menu/start.js");
        let report = TransformReport::diff(&before, &archive);

        Ok(Transformed { archive, report })
    }
}

pub(crate) fn file_text(archive: &Archive, path: impl AsRef<Path>) -> Option<String> {
    archive
        .file(path)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}
