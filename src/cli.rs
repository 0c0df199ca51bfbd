use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::logging;
use crate::stats::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(
    name = "repostats",
    about = "Collect GitHub traffic and keep a cumulative history of it",
    version,
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every metric, write today's snapshots and update cumulative files
    Collect(CollectArgs),
    /// Show the resolved configuration
    Status(SourceArgs),
    /// Zip a day's snapshot folder
    Archive(DayArgs),
    /// Delete a day's snapshot folder
    Clean(DayArgs),
}

#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Repository as owner/name
    #[arg(long)]
    repo: Option<String>,

    /// GitHub token (prefer REPOSTATS_TOKEN or GITHUB_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Workspace directory holding snapshots and cumulative files
    #[arg(long)]
    workspace: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CollectArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Zip the snapshot folder after collecting
    #[arg(long)]
    zip: bool,

    /// Delete the snapshot folder after collecting (and zipping)
    #[arg(long)]
    delete_snapshot: bool,
}

#[derive(Args, Debug)]
struct DayArgs {
    /// Workspace directory holding snapshots
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Day of the snapshot folder, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long)]
    date: Option<String>,
}

impl SourceArgs {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            repository: self.repo,
            token: self.token,
            workspace: self.workspace,
            ..ConfigOverrides::default()
        }
    }
}

fn workspace_only(workspace: Option<PathBuf>) -> ConfigOverrides {
    ConfigOverrides {
        workspace,
        ..ConfigOverrides::default()
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let state = if report.ok { "ok" } else { "failed" };
    println!("{}: {state}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match cli.command {
        Command::Collect(args) => {
            let mut overrides = args.source.overrides();
            overrides.zip = args.zip;
            overrides.delete_snapshot = args.delete_snapshot;
            commands::collect::run(&commands::collect::CollectOptions { overrides })?
        }
        Command::Status(args) => commands::status::run(&commands::status::StatusOptions {
            overrides: args.overrides(),
        })?,
        Command::Archive(args) => commands::archive::run(&commands::archive::ArchiveOptions {
            overrides: workspace_only(args.workspace),
            date: args.date,
        })?,
        Command::Clean(args) => commands::clean::run(&commands::clean::CleanOptions {
            overrides: workspace_only(args.workspace),
            date: args.date,
        })?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!(
            "{} reported {} issue(s)",
            report.command,
            report.issues.len()
        );
    }
    Ok(())
}
