// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Target installation discovery.
//!
//! Reskin can operate on any installation of the target application, so the
//! first step of every operation is figuring out which one. Installations are
//! discovered through the known installation mechanisms, each one is given a
//! comparable version descriptor, and the operator picks one when more than
//! one turns up.
//!
//! # Installation Mechanisms
//!
//! Two mechanisms are searched in a fixed priority order:
//!
//! 1. __Launcher__: a launcher data directory holding one folder per
//!    installed version. Folders are named by GUID, i.e., five segments
//!    separated by dashes. These installs are writable through ordinary file
//!    system calls.
//! 2. __Package__: a system-managed package directory. Only consulted when
//!    the launcher directory cannot be enumerated at all, not when it merely
//!    holds zero installs. These installs are locked down, and require the
//!    forced access strategy.
//!
//! Each installation carries an `AppxManifest.xml` file. Its identity version
//! and display name determine the version descriptor. A manifest that cannot
//! be read or parsed yields an unknown version instead of failing discovery.

use crate::{access::AccessKind, config::TargetSettings, path::default_launcher_dir};

use anstyle::{AnsiColor, Style};
use std::{
    cmp::Ordering,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_dir, read_to_string},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Name of manifest file at the root of every installation.
pub const MANIFEST_FILE: &str = "AppxManifest.xml";

/// Release channel of an installation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Release,
    Preview,
    Dev,
    Unknown,
}

impl Channel {
    fn style(&self) -> Style {
        let color = match self {
            Self::Release => AnsiColor::BrightGreen,
            Self::Preview => AnsiColor::BrightYellow,
            Self::Dev => AnsiColor::BrightMagenta,
            Self::Unknown => AnsiColor::BrightRed,
        };

        Style::new().fg_color(Some(color.into()))
    }
}

impl Display for Channel {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Release => fmt.write_str("Release"),
            Self::Preview => fmt.write_str("Preview"),
            Self::Dev => fmt.write_str("Dev"),
            Self::Unknown => fmt.write_str("Unknown"),
        }
    }
}

/// Comparable version of an installation.
///
/// Known versions compare by their `(major, minor, patch, revision)` tuple
/// alone. Channels never take part in comparison. Unknown versions sort below
/// every known version, so descending order always lists them last.
#[derive(Debug, Copy, Clone)]
pub enum VersionDescriptor {
    Known {
        major: u32,
        minor: u32,
        patch: u32,
        revision: u32,
        channel: Channel,
    },
    Unknown,
}

impl VersionDescriptor {
    /// Construct new known version descriptor.
    pub fn known(major: u32, minor: u32, patch: u32, revision: u32, channel: Channel) -> Self {
        Self::Known {
            major,
            minor,
            patch,
            revision,
            channel,
        }
    }

    /// Parse version descriptor out of manifest content.
    ///
    /// The identity version `a.b.cccDD.x` maps to `(a, b, ccc, DD)`. The
    /// channel comes from the identity name or display name.
    ///
    /// Returns [`VersionDescriptor::Unknown`] if no identity version exists.
    pub fn from_manifest(content: &str) -> Self {
        let Some(identity) = element(content, "Identity") else {
            return Self::Unknown;
        };
        let Some(version) = attribute(identity, "Version") else {
            return Self::Unknown;
        };
        let Some((major, minor, patch, revision)) = parse_quad(version) else {
            return Self::Unknown;
        };

        let name = attribute(identity, "Name").unwrap_or_default();
        let display = display_name(content).unwrap_or_default();
        let channel = if name.contains("WindowsBeta") || display.contains("Preview") {
            Channel::Preview
        } else if name.ends_with("Dev") || display.contains("Dev") {
            Channel::Dev
        } else if name.contains("MinecraftUWP") || display == "Minecraft for Windows" {
            Channel::Release
        } else {
            Channel::Unknown
        };

        Self::known(major, minor, patch, revision, channel)
    }

    /// Release channel, [`Channel::Unknown`] for unknown versions.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Known { channel, .. } => *channel,
            Self::Unknown => Channel::Unknown,
        }
    }

    /// Check if version could not be determined.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    fn tuple(&self) -> Option<(u32, u32, u32, u32)> {
        match self {
            Self::Known {
                major,
                minor,
                patch,
                revision,
                ..
            } => Some((*major, *minor, *patch, *revision)),
            Self::Unknown => None,
        }
    }
}

impl PartialEq for VersionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionDescriptor {}

impl PartialOrd for VersionDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        // INVARIANT: Option orders None first, so unknown is always lowest.
        self.tuple().cmp(&other.tuple())
    }
}

impl Display for VersionDescriptor {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Known {
                major,
                minor,
                patch,
                revision,
                channel,
            } => write!(fmt, "{major}.{minor}.{patch}.{revision} ({channel})"),
            Self::Unknown => fmt.write_str("Unable to determine version"),
        }
    }
}

/// One discovered installation of the target application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCandidate {
    /// Root directory of installation.
    pub path: PathBuf,

    /// Relative path of mutable asset subtree within installation.
    pub asset_dir: PathBuf,

    /// Version of installation.
    pub version: VersionDescriptor,

    /// Access strategy this installation requires.
    pub access: AccessKind,
}

impl TargetCandidate {
    /// Construct new candidate, reading its manifest for a version.
    pub fn probe(path: impl Into<PathBuf>, asset_dir: impl Into<PathBuf>, access: AccessKind) -> Self {
        let path = path.into();
        let version = match read_to_string(path.join(MANIFEST_FILE)) {
            Ok(content) => VersionDescriptor::from_manifest(&content),
            Err(err) => {
                debug!("no readable manifest in {:?}: {err}", path.display());
                VersionDescriptor::Unknown
            }
        };

        Self {
            path,
            asset_dir: asset_dir.into(),
            version,
            access,
        }
    }

    /// Absolute path to the live asset tree.
    pub fn live_tree(&self) -> PathBuf {
        self.path.join(&self.asset_dir)
    }

    /// Basename of installation, used to key per-target state.
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".into())
    }
}

/// Sort candidates from highest to lowest version, unknown versions last.
///
/// Sorting is stable, so equal versions keep their discovery order.
pub fn sort_candidates(candidates: &mut [TargetCandidate]) {
    candidates.sort_by(|a, b| b.version.cmp(&a.version));
}

/// Render numbered candidate listing, grouped and colored by channel.
///
/// Groups appear in the order their first candidate does. Numbers are
/// positions in `candidates`, so they match what [`select`] expects after
/// [`sort_candidates`].
pub fn render_candidates(candidates: &[TargetCandidate]) -> String {
    let mut channels = Vec::new();
    for candidate in candidates {
        let channel = candidate.version.channel();
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }

    let mut lines = Vec::new();
    for channel in channels {
        let style = channel.style();
        lines.push(format!("{}{channel}{}", style.bold().render(), style.render_reset()));
        let members = candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.version.channel() == channel);
        for (index, candidate) in members {
            lines.push(format!(
                "  {}: {}{}{}  {}",
                index + 1,
                style.render(),
                candidate.version,
                style.render_reset(),
                candidate.path.display()
            ));
        }
    }

    lines.join("\n")
}

/// Layer of indirection for operator selection.
pub trait Selector {
    /// Ask operator to pick one of the candidates.
    ///
    /// Returns the raw answer, which should be a 1-based index.
    fn choose(&self, candidates: &[TargetCandidate]) -> Result<String>;
}

/// Operator selection through an interactive terminal prompt.
#[derive(Debug, Default)]
pub struct PromptSelector {
    action: String,
}

impl PromptSelector {
    /// Construct new prompt selector describing the pending action.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

impl Selector for PromptSelector {
    fn choose(&self, candidates: &[TargetCandidate]) -> Result<String> {
        let heading = Style::new().fg_color(Some(AnsiColor::BrightYellow.into()));
        println!(
            "{}Multiple installations were found, enter the number of the one to {}:{}",
            heading.render(),
            self.action,
            heading.render_reset()
        );
        println!("{}", render_candidates(candidates));

        Ok(inquire::Text::new("Selection:").prompt()?)
    }
}

/// Pick exactly one candidate.
///
/// A single candidate is picked without asking. Multiple candidates are
/// sorted, then the operator is asked through `selector`.
///
/// # Errors
///
/// - Return [`Error::NoTargetFound`] if `candidates` is empty.
/// - Return [`Error::InvalidSelection`] if operator's answer is not a valid
///   1-based index.
/// - Return [`Error::Prompt`] if the operator cannot be asked.
pub fn select(
    mut candidates: Vec<TargetCandidate>,
    selector: &impl Selector,
) -> Result<TargetCandidate> {
    match candidates.len() {
        0 => Err(Error::NoTargetFound {
            searched: String::from("no installation mechanisms"),
        }),
        1 => Ok(candidates.remove(0)),
        count => {
            sort_candidates(&mut candidates);
            let answer = selector.choose(&candidates)?;
            let index = answer
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|index| (1..=count).contains(index))
                .ok_or_else(|| Error::InvalidSelection {
                    answer: answer.trim().to_string(),
                    count,
                })?;

            Ok(candidates.swap_remove(index - 1))
        }
    }
}

/// Discover installations through known installation mechanisms.
#[derive(Debug, Clone)]
pub struct Locator {
    launcher_dir: Option<PathBuf>,
    package_dir: PathBuf,
    package_prefixes: Vec<String>,
    asset_dir: PathBuf,
}

impl Locator {
    /// Construct new locator.
    pub fn new(
        launcher_dir: Option<PathBuf>,
        package_dir: impl Into<PathBuf>,
        package_prefixes: Vec<String>,
        asset_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher_dir,
            package_dir: package_dir.into(),
            package_prefixes,
            asset_dir: asset_dir.into(),
        }
    }

    /// Construct new locator from target settings.
    ///
    /// Falls back to default mechanism locations for anything the settings
    /// leave out. A launcher directory that cannot be determined is simply
    /// not searched.
    pub fn from_settings(settings: &TargetSettings) -> Self {
        let launcher_dir = settings
            .launcher_dir
            .clone()
            .or_else(|| default_launcher_dir().ok());
        let package_dir = settings
            .package_dir
            .clone()
            .unwrap_or_else(crate::path::default_package_dir);

        Self::new(
            launcher_dir,
            package_dir,
            settings.package_prefixes.clone(),
            &settings.asset_dir,
        )
    }

    /// Describe the mechanisms searched, for error reporting.
    pub fn describe(&self) -> String {
        let mut searched = Vec::new();
        if let Some(launcher_dir) = &self.launcher_dir {
            searched.push(format!("launcher versions at {:?}", launcher_dir.display()));
        }
        searched.push(format!(
            "packages {:?} at {:?}",
            self.package_prefixes,
            self.package_dir.display()
        ));

        searched.join(", ")
    }

    /// Enumerate all candidates.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Glob`] if a package prefix forms an invalid pattern.
    #[instrument(skip(self), level = "debug")]
    pub fn locate(&self) -> Result<Vec<TargetCandidate>> {
        if let Some(launcher_dir) = &self.launcher_dir {
            match self.locate_launcher(launcher_dir) {
                Ok(candidates) => {
                    info!("found {} launcher installation(s)", candidates.len());
                    return Ok(candidates);
                }
                Err(err) => {
                    debug!("cannot enumerate {:?}: {err}", launcher_dir.display());
                }
            }
        }

        let candidates = self.locate_packages()?;
        info!("found {} package installation(s)", candidates.len());

        Ok(candidates)
    }

    /// Enumerate candidates, then pick exactly one.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NoTargetFound`] if nothing was discovered, naming the
    ///   mechanisms searched.
    /// - Return any error of [`select`].
    pub fn resolve(&self, selector: &impl Selector) -> Result<TargetCandidate> {
        let candidates = self.locate()?;
        if candidates.is_empty() {
            return Err(Error::NoTargetFound {
                searched: self.describe(),
            });
        }

        select(candidates, selector)
    }

    fn locate_launcher(&self, launcher_dir: &Path) -> std::io::Result<Vec<TargetCandidate>> {
        let mut candidates = Vec::new();
        for entry in read_dir(launcher_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            // INVARIANT: Only GUID-named version folders count.
            if !entry.path().is_dir() || name.split('-').count() != 5 {
                debug!("skip launcher entry {name:?}");
                continue;
            }

            candidates.push(TargetCandidate::probe(
                entry.path(),
                &self.asset_dir,
                AccessKind::Direct,
            ));
        }
        candidates.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(candidates)
    }

    fn locate_packages(&self) -> Result<Vec<TargetCandidate>> {
        if !self.package_dir.is_dir() {
            warn!("package directory {:?} does not exist", self.package_dir.display());
            return Ok(Vec::new());
        }

        let base = glob::Pattern::escape(&self.package_dir.to_string_lossy());
        let mut paths = Vec::new();
        for prefix in &self.package_prefixes {
            let pattern = format!("{base}/{}*", glob::Pattern::escape(prefix));
            for path in glob::glob(&pattern)?.flatten() {
                if path.is_dir() && !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| TargetCandidate::probe(path, &self.asset_dir, AccessKind::Forced))
            .collect())
    }
}

fn element<'a>(content: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let mut rest = content;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // INVARIANT: Reject longer tag names sharing the prefix.
        if after.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
            let end = after.find('>')?;
            return Some(&after[..end]);
        }
        rest = after;
    }

    None
}

fn attribute<'a>(element: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = element;
    let needle = format!("{name}=\"");
    while let Some(start) = rest.find(&needle) {
        let preceded = rest[..start]
            .chars()
            .last()
            .is_none_or(|c| c.is_whitespace());
        let after = &rest[start + needle.len()..];
        if preceded {
            let end = after.find('"')?;
            return Some(&after[..end]);
        }
        rest = after;
    }

    None
}

fn display_name(content: &str) -> Option<&str> {
    let start = content.find("<DisplayName>")? + "<DisplayName>".len();
    let end = content[start..].find("</DisplayName>")?;
    Some(content[start..start + end].trim())
}

fn parse_quad(version: &str) -> Option<(u32, u32, u32, u32)> {
    let mut segments = version.split('.');
    let major = segments.next()?.parse().ok()?;
    let minor = segments.next()?.parse().ok()?;
    let build = segments.next()?;
    if build.is_empty() || !build.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    // INVARIANT: Last two digits of the build segment are the revision.
    let split = build.len().saturating_sub(2);
    let patch = if split == 0 { 0 } else { build[..split].parse().ok()? };
    let revision = build[split..].parse().ok()?;

    Some((major, minor, patch, revision))
}

/// Target discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing was discovered.
    #[error("no installation of the target application found, searched {searched}")]
    NoTargetFound { searched: String },

    /// Operator's answer is not a valid 1-based index.
    #[error("invalid selection {answer:?}, expected a number from 1 to {count}")]
    InvalidSelection { answer: String, count: usize },

    /// Operator cannot be prompted.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    /// Package prefix forms an invalid glob pattern.
    #[error(transparent)]
    Glob(#[from] glob::PatternError),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::{formatdoc, indoc};
    use simple_test_case::test_case;
    use std::{
        cell::Cell,
        fs::{create_dir_all, write},
    };

    fn manifest(name: &str, version: &str, display: &str) -> String {
        formatdoc! {r#"
            <?xml version="1.0" encoding="utf-8"?>
            <Package xmlns="http://schemas.microsoft.com/appx/manifest/foundation/windows10">
              <Identity Name="{name}" Publisher="CN=Vendor" Version="{version}" ProcessorArchitecture="x64" />
              <Properties>
                <DisplayName>{display}</DisplayName>
              </Properties>
            </Package>
        "#}
    }

    fn candidate(path: &str, version: VersionDescriptor) -> TargetCandidate {
        TargetCandidate {
            path: PathBuf::from(path),
            asset_dir: PathBuf::from("data/gui"),
            version,
            access: AccessKind::Direct,
        }
    }

    struct Answer(&'static str, Cell<usize>);

    impl Answer {
        fn new(answer: &'static str) -> Self {
            Self(answer, Cell::new(0))
        }
    }

    impl Selector for Answer {
        fn choose(&self, _: &[TargetCandidate]) -> Result<String> {
            self.1.set(self.1.get() + 1);
            Ok(self.0.into())
        }
    }

    #[test_case("Microsoft.MinecraftUWP", "1.21.8003.0", "Minecraft for Windows", VersionDescriptor::known(1, 21, 80, 3, Channel::Release); "release")]
    #[test_case("Microsoft.MinecraftWindowsBeta", "1.21.9020.0", "Minecraft Windows Preview", VersionDescriptor::known(1, 21, 90, 20, Channel::Preview); "preview")]
    #[test_case("Vendor.Game", "2.0.5.0", "Some Game", VersionDescriptor::known(2, 0, 0, 5, Channel::Unknown); "short build segment")]
    #[test_case("Microsoft.MinecraftUWP", "garbage", "Minecraft for Windows", VersionDescriptor::Unknown; "unparsable version")]
    #[test]
    fn parse_manifest(name: &str, version: &str, display: &str, expect: VersionDescriptor) {
        let result = VersionDescriptor::from_manifest(&manifest(name, version, display));
        assert_eq!(result, expect);
        assert_eq!(result.channel(), expect.channel());
    }

    #[test]
    fn parse_manifest_without_identity() {
        let content = indoc! {r#"
            <Package>
              <Identities Version="1.2.300.0" />
            </Package>
        "#};
        assert!(VersionDescriptor::from_manifest(content).is_unknown());
    }

    #[test]
    fn sort_puts_newest_first_and_unknown_last() {
        let mut candidates = vec![
            candidate("release", VersionDescriptor::known(1, 21, 80, 3, Channel::Release)),
            candidate("unknown", VersionDescriptor::Unknown),
            candidate("preview", VersionDescriptor::known(1, 21, 90, 20, Channel::Preview)),
        ];
        sort_candidates(&mut candidates);

        let result = candidates
            .iter()
            .map(|candidate| candidate.path.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(result, vec!["preview", "release", "unknown"]);
    }

    #[test]
    fn equal_tuples_ignore_channel() {
        let release = VersionDescriptor::known(1, 2, 3, 4, Channel::Release);
        let preview = VersionDescriptor::known(1, 2, 3, 4, Channel::Preview);
        assert_eq!(release.cmp(&preview), Ordering::Equal);
        assert!(VersionDescriptor::Unknown < VersionDescriptor::known(0, 0, 0, 0, Channel::Dev));
    }

    #[test]
    fn select_single_candidate_without_prompt() -> anyhow::Result<()> {
        let selector = Answer::new("99");
        let only = candidate("only", VersionDescriptor::Unknown);
        let result = select(vec![only.clone()], &selector)?;

        assert_eq!(result, only);
        assert_eq!(selector.1.get(), 0);

        Ok(())
    }

    #[test_case("1", "new"; "first")]
    #[test_case(" 2 ", "old"; "padded")]
    #[test_case("3", "unknown"; "last")]
    #[test]
    fn select_by_sorted_index(answer: &'static str, expect: &str) -> anyhow::Result<()> {
        let candidates = vec![
            candidate("old", VersionDescriptor::known(1, 0, 0, 0, Channel::Release)),
            candidate("unknown", VersionDescriptor::Unknown),
            candidate("new", VersionDescriptor::known(2, 0, 0, 0, Channel::Preview)),
        ];
        let result = select(candidates, &Answer::new(answer))?;
        assert_eq!(result.path, PathBuf::from(expect));

        Ok(())
    }

    #[test_case("0"; "zero")]
    #[test_case("4"; "past end")]
    #[test_case("two"; "not a number")]
    #[test_case(""; "empty")]
    #[test]
    fn select_rejects_invalid_index(answer: &'static str) {
        let candidates = vec![
            candidate("a", VersionDescriptor::Unknown),
            candidate("b", VersionDescriptor::Unknown),
            candidate("c", VersionDescriptor::Unknown),
        ];
        let result = select(candidates, &Answer::new(answer));
        assert!(matches!(result, Err(Error::InvalidSelection { count: 3, .. })));
    }

    #[test]
    fn select_nothing_fails() {
        let result = select(Vec::new(), &Answer::new("1"));
        assert!(matches!(result, Err(Error::NoTargetFound { .. })));
    }

    #[test]
    fn locate_launcher_versions() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let launcher = root.path().join("versions");
        let first = launcher.join("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee");
        let second = launcher.join("11111111-2222-3333-4444-555555555555");
        create_dir_all(&first)?;
        create_dir_all(&second)?;
        create_dir_all(launcher.join("not-a-guid"))?;
        write(
            first.join(MANIFEST_FILE),
            manifest("Microsoft.MinecraftUWP", "1.21.8003.0", "Minecraft for Windows"),
        )?;

        let locator = Locator::new(
            Some(launcher),
            root.path().join("packages"),
            vec!["Microsoft.MinecraftUWP".into()],
            "data/gui",
        );
        let result = locator.locate()?;

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|candidate| candidate.access == AccessKind::Direct));
        let probed = result.iter().find(|candidate| candidate.path == first).unwrap();
        assert_eq!(probed.version, VersionDescriptor::known(1, 21, 80, 3, Channel::Release));
        assert_eq!(probed.live_tree(), first.join("data/gui"));
        let unprobed = result.iter().find(|candidate| candidate.path == second).unwrap();
        assert!(unprobed.version.is_unknown());

        Ok(())
    }

    #[test]
    fn empty_launcher_does_not_fall_back() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let launcher = root.path().join("versions");
        let packages = root.path().join("packages");
        create_dir_all(&launcher)?;
        create_dir_all(packages.join("Microsoft.MinecraftUWP_8wekyb3d8bbwe"))?;

        let locator = Locator::new(
            Some(launcher),
            packages,
            vec!["Microsoft.MinecraftUWP".into()],
            "data/gui",
        );
        assert!(locator.locate()?.is_empty());
        assert!(matches!(
            locator.resolve(&Answer::new("1")),
            Err(Error::NoTargetFound { .. })
        ));

        Ok(())
    }

    #[test]
    fn missing_launcher_falls_back_to_packages() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let packages = root.path().join("packages");
        let release = packages.join("Microsoft.MinecraftUWP_8wekyb3d8bbwe");
        create_dir_all(&release)?;
        create_dir_all(packages.join("Microsoft.MinecraftWindowsBeta_8wekyb3d8bbwe"))?;
        create_dir_all(packages.join("Microsoft.Unrelated_8wekyb3d8bbwe"))?;
        write(
            release.join(MANIFEST_FILE),
            manifest("Microsoft.MinecraftUWP", "1.21.8003.0", "Minecraft for Windows"),
        )?;

        let locator = Locator::new(
            Some(root.path().join("missing")),
            packages,
            vec![
                "Microsoft.MinecraftUWP".into(),
                "Microsoft.MinecraftWindowsBeta".into(),
            ],
            "data/gui",
        );
        let result = locator.locate()?;

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|candidate| candidate.access == AccessKind::Forced));

        // Newest known version sorts first, and that is what "1" picks.
        let picked = locator.resolve(&Answer::new("1"))?;
        assert_eq!(picked.path, release);

        Ok(())
    }

    #[test]
    fn render_groups_by_channel_and_keeps_numbers() {
        let candidates = vec![
            candidate("/a", VersionDescriptor::known(1, 21, 90, 20, Channel::Preview)),
            candidate("/b", VersionDescriptor::known(1, 21, 80, 3, Channel::Release)),
            candidate("/c", VersionDescriptor::known(1, 20, 0, 1, Channel::Preview)),
            candidate("/d", VersionDescriptor::Unknown),
        ];
        let result = render_candidates(&candidates);
        let lines = result.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 7);
        assert!(lines[0].contains("Preview"));
        assert!(lines[1].starts_with("  1: ") && lines[1].contains("1.21.90.20 (Preview)"));
        assert!(lines[2].starts_with("  3: ") && lines[2].ends_with("/c"));
        assert!(lines[3].contains("Release"));
        assert!(lines[4].starts_with("  2: ") && lines[4].ends_with("/b"));
        assert!(lines[5].contains("Unknown"));
        assert!(lines[6].starts_with("  4: ") && lines[6].contains("Unable to determine version"));
    }
}
