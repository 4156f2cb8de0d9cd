// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use reskin::{
    access::AccessKind,
    backup::BackupStore,
    config::Settings,
    locate::{render_candidates, sort_candidates, Locator, PromptSelector, TargetCandidate},
    overlay::{InstallReport, Overlay, OverlayState},
    path::{default_config_file, default_data_dir},
    process::{ProcessQuery, SystemProcesses},
    transform::CommandTransform,
};

use anstyle::{AnsiColor, Style};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::{fs::read_to_string, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "reskin [options] <reskin-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file to use instead of the default one.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Operate on this installation instead of searching for one.
    #[arg(short, long, global = true, value_name = "path")]
    pub target: Option<PathBuf>,

    /// Use forced access on the installation given by --target.
    #[arg(long, global = true, requires = "target")]
    pub forced: bool,

    /// Show debug logs.
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let mut settings = load_settings(self.config)?;
        if let Some(target) = self.target {
            settings.target.path = Some(target);
            if self.forced {
                settings.target.access = Some(AccessKind::Forced);
            }
        }

        match self.command {
            Command::Install => run_install(settings).await,
            Command::Uninstall => run_uninstall(settings).await,
            Command::Status => run_status(settings),
            Command::List => run_list(settings),
            Command::ExportConfig(opts) => run_export_config(settings, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Back up pristine assets, then overlay them with the transform output.
    #[command(override_usage = "reskin install [options]")]
    Install,

    /// Restore pristine assets from backup.
    #[command(override_usage = "reskin uninstall [options]")]
    Uninstall,

    /// Show overlay state of target installation.
    #[command(override_usage = "reskin status [options]")]
    Status,

    /// List discovered installations.
    #[command(override_usage = "reskin list [options]")]
    List,

    /// Export transform settings of installed overlay.
    #[command(override_usage = "reskin export-config [options] [path]")]
    ExportConfig(ExportConfigOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExportConfigOptions {
    /// Path to write settings to, prompted for if left out.
    #[arg(value_name = "path")]
    pub path: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer().compact().with_target(false).without_time();
    let level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (default_config_file()?, false),
    };

    if !required && !path.exists() {
        info!("no settings file at {:?}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let data = read_to_string(&path)
        .with_context(|| format!("failed to read settings file {:?}", path.display()))?;
    let settings = data
        .parse::<Settings>()
        .with_context(|| format!("invalid settings file {:?}", path.display()))?;

    Ok(settings)
}

fn resolve_target<P>(overlay: &Overlay<P>, settings: &Settings, action: &str) -> Result<TargetCandidate>
where
    P: ProcessQuery,
{
    if let Some(path) = &settings.target.path {
        let access = settings.target.access.unwrap_or_default();
        return Ok(TargetCandidate::probe(path, &settings.target.asset_dir, access));
    }

    let locator = Locator::from_settings(&settings.target);
    Ok(overlay.resolve(&locator, &PromptSelector::new(action))?)
}

fn new_overlay(settings: &Settings) -> Result<Overlay<SystemProcesses>> {
    let backups = BackupStore::new(default_data_dir()?);
    Ok(Overlay::new(backups, SystemProcesses::new(), &settings.target.process_name))
}

fn spinner() -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

async fn run_install(settings: Settings) -> Result<()> {
    let command = settings
        .transform
        .command
        .clone()
        .ok_or_else(|| anyhow!("no transform configured, set [transform.command] in the settings file"))?;
    let overlay = new_overlay(&settings)?;
    let candidate = resolve_target(&overlay, &settings, "install to")?;
    let session = overlay.open_session(candidate, &settings.helper)?;

    let bar = spinner()?;
    let overlay = overlay.with_progress(bar.clone());
    let transform = CommandTransform::new(command, overlay.backups().scratch_dir());
    let table = settings.transform.settings;

    let result =
        tokio::task::spawn_blocking(move || overlay.install(&session, &transform, &table)).await?;
    bar.finish_and_clear();

    print_install_report(&result?);

    Ok(())
}

async fn run_uninstall(settings: Settings) -> Result<()> {
    let overlay = new_overlay(&settings)?;
    let candidate = resolve_target(&overlay, &settings, "uninstall from")?;
    let session = overlay.open_session(candidate, &settings.helper)?;

    let bar = spinner()?;
    let overlay = overlay.with_progress(bar.clone());

    let result = tokio::task::spawn_blocking(move || overlay.uninstall(&session)).await?;
    bar.finish_and_clear();

    let report = result?;
    println!(
        "{}Restored{} {:?}",
        highlight(AnsiColor::BrightGreen).render(),
        highlight(AnsiColor::BrightGreen).render_reset(),
        report.live_tree.display()
    );

    Ok(())
}

fn run_status(settings: Settings) -> Result<()> {
    let overlay = new_overlay(&settings)?;
    let candidate = resolve_target(&overlay, &settings, "inspect")?;
    let status = overlay.status(&candidate)?;

    let color = match status.state {
        OverlayState::Uninstalled => AnsiColor::BrightBlue,
        OverlayState::Overlaid => AnsiColor::BrightGreen,
    };
    let style = highlight(color);
    println!("target:    {:?}", candidate.path.display());
    println!("version:   {}", candidate.version);
    println!("access:    {}", candidate.access);
    println!("state:     {}{}{}", style.render(), status.state, style.render_reset());
    match &status.backup {
        Some(record) => println!("backup:    {:?} ({:?})", record.storage.display(), record.location),
        None => println!("backup:    none"),
    }
    if let Some(marker) = &status.marker {
        println!("transform: {} {}", marker.transform, marker.transform_version.as_deref().unwrap_or(""));
    }
    if let Some(last_used) = &status.last_used {
        println!("last used: reskin {}", last_used.tool_version);
    }
    if status.marker.is_some() && status.backup.is_none() {
        warn!("overlay marker present but no backup found, uninstall cannot restore this target");
    }

    Ok(())
}

fn run_list(settings: Settings) -> Result<()> {
    let locator = Locator::from_settings(&settings.target);
    let mut candidates = locator.locate()?;
    if candidates.is_empty() {
        println!("no installations found, searched {}", locator.describe());
        return Ok(());
    }

    sort_candidates(&mut candidates);
    println!("{}", render_candidates(&candidates));

    Ok(())
}

fn run_export_config(settings: Settings, opts: ExportConfigOptions) -> Result<()> {
    let overlay = new_overlay(&settings)?;
    let candidate = resolve_target(&overlay, &settings, "export settings from")?;
    let dest = match opts.path {
        Some(path) => path,
        None => PathBuf::from(
            inquire::Text::new("Export settings to:")
                .with_default("reskin-settings.toml")
                .prompt()?,
        ),
    };

    let marker = overlay.export_settings(&candidate, &dest)?;
    println!(
        "exported {} settings of {} to {:?}",
        marker.settings.len(),
        marker.transform,
        dest.display()
    );

    Ok(())
}

fn print_install_report(installed: &InstallReport) {
    let report = &installed.report;
    let style = highlight(AnsiColor::BrightGreen);
    println!(
        "{}Overlaid{} {:?} (backup {:?})",
        style.render(),
        style.render_reset(),
        installed.live_tree.display(),
        installed.origin
    );
    println!(
        "added {}, removed {}, modified {}, unmodified {}, edited {}, renamed {}, total {}",
        report.added,
        report.removed,
        report.modified,
        report.unmodified,
        report.edited,
        report.renamed,
        report.total_entries
    );

    if report.has_failures() {
        let style = highlight(AnsiColor::BrightYellow);
        println!("{}Some replacements failed:{}", style.render(), style.render_reset());
        for (file, failures) in &report.failed_replaces {
            for failure in failures {
                println!("  {file}: {failure}");
            }
        }
    }
}

fn highlight(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(color.into())).bold()
}
