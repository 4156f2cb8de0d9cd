// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the settings file that Reskin uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! Settings are plain structured data. Nothing in a settings file is ever
//! executed, the transform settings table is handed to the transform as-is.

use crate::access::AccessKind;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Default name of the target application's executable.
pub const DEFAULT_PROCESS_NAME: &str = "Minecraft.Windows.exe";

/// Default relative path of the mutable asset subtree inside an install.
pub const DEFAULT_ASSET_DIR: &str = "data/gui";

/// Default location of the forced-access helper executable.
pub const DEFAULT_HELPER_PROGRAM: &str =
    r"C:\Program Files (x86)\IObit\IObit Unlocker\IObitUnlocker.exe";

/// Default maximum number of paths handed to the helper per invocation.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Settings file layout.
///
/// # General Layout
///
/// The settings file is composed of three sections: target, helper, and
/// transform. The target section narrows down which installation to operate
/// on. The helper section configures the forced-access helper. The transform
/// section names the external transform and the opaque settings it receives.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Target selection settings.
    #[serde(default)]
    pub target: TargetSettings,

    /// Forced-access helper settings.
    #[serde(default)]
    pub helper: HelperSettings,

    /// External transform settings.
    #[serde(default)]
    pub transform: TransformSettings,
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.target.path = settings.target.path.map(expand).transpose()?;
        settings.target.launcher_dir = settings.target.launcher_dir.map(expand).transpose()?;
        settings.target.package_dir = settings.target.package_dir.map(expand).transpose()?;
        settings.helper.program = expand(settings.helper.program)?;
        if let Some(command) = settings.transform.command.as_mut() {
            command.program = expand(command.program.clone())?;
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Target selection settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetSettings {
    /// Skip discovery and operate on this installation directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Access strategy to use with [`TargetSettings::path`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessKind>,

    /// Relative path of the mutable asset subtree inside an installation.
    pub asset_dir: PathBuf,

    /// Executable name of the target application.
    pub process_name: String,

    /// Override for the launcher versions directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launcher_dir: Option<PathBuf>,

    /// Override for the system-managed package directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_dir: Option<PathBuf>,

    /// Folder name prefixes that identify installs in the package directory.
    pub package_prefixes: Vec<String>,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            path: None,
            access: None,
            asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
            process_name: DEFAULT_PROCESS_NAME.into(),
            launcher_dir: None,
            package_dir: None,
            package_prefixes: vec![
                "Microsoft.MinecraftUWP".into(),
                "Microsoft.MinecraftWindowsBeta".into(),
            ],
        }
    }
}

/// Forced-access helper settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HelperSettings {
    /// Path to helper executable.
    pub program: PathBuf,

    /// Maximum number of paths per helper invocation.
    pub batch_size: usize,

    /// Deadline for a single helper invocation in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_HELPER_PROGRAM),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: None,
        }
    }
}

/// External transform settings.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformSettings {
    /// External program that performs the transform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<TransformCommand>,

    /// Opaque settings handed to the transform.
    pub settings: toml::Table,
}

/// External transform program invocation.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct TransformCommand {
    /// Program to execute.
    pub program: PathBuf,

    /// Extra arguments placed before the input, output, and settings paths.
    #[serde(default)]
    pub args: Vec<String>,
}

fn expand(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("GAME", "/games/mc"), ("TOOLS", "/opt/tools")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [target]
            path = "$GAME/install"
            access = "forced"
            process_name = "Game.exe"

            [helper]
            program = "$TOOLS/unlocker"
            batch_size = 10
            timeout_secs = 30

            [transform.command]
            program = "$TOOLS/patcher"
            args = ["--quiet"]

            [transform.settings]
            hide_clock = true
            theme = "dark"
        "#
        .parse()?;

        let mut table = toml::Table::new();
        table.insert("hide_clock".into(), toml::Value::Boolean(true));
        table.insert("theme".into(), toml::Value::String("dark".into()));

        let expect = Settings {
            target: TargetSettings {
                path: Some(PathBuf::from("/games/mc/install")),
                access: Some(AccessKind::Forced),
                process_name: "Game.exe".into(),
                ..Default::default()
            },
            helper: HelperSettings {
                program: PathBuf::from("/opt/tools/unlocker"),
                batch_size: 10,
                timeout_secs: Some(30),
            },
            transform: TransformSettings {
                command: Some(TransformCommand {
                    program: PathBuf::from("/opt/tools/patcher"),
                    args: vec!["--quiet".into()],
                }),
                settings: table,
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn empty_settings_use_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());
        assert_eq!(result.helper.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(result.target.asset_dir, PathBuf::from(DEFAULT_ASSET_DIR));

        Ok(())
    }

    #[test]
    fn serialized_settings_parse_back() -> anyhow::Result<()> {
        let mut settings = Settings::default();
        settings.target.process_name = "Game.exe".into();
        settings.target.package_prefixes = vec!["Vendor.Game".into()];
        settings.helper.program = PathBuf::from("/opt/tools/unlocker");
        settings
            .transform
            .settings
            .insert("theme".into(), toml::Value::String("dark".into()));

        let text = settings.to_string();
        assert!(text.contains("[helper]"));
        assert!(!text.contains("timeout_secs"));

        let result: Settings = text.parse()?;
        assert_eq!(result, settings);

        Ok(())
    }
}
