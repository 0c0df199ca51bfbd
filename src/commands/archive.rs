use anyhow::Result;

use crate::commands::{CommandReport, resolve_day};
use crate::stats::config::{ConfigOverrides, load_config};
use crate::stats::snapshot::SnapshotFolder;

#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    pub overrides: ConfigOverrides,
    pub date: Option<String>,
}

pub fn run(opts: &ArchiveOptions) -> Result<CommandReport> {
    let cfg = load_config(&opts.overrides)?;
    let day = resolve_day(opts.date.as_deref())?;
    let mut report = CommandReport::new("archive");

    let folder = SnapshotFolder::locate(&cfg.workspace.root, day);
    report.detail(format!("snapshot_dir={}", folder.dir().display()));
    if !folder.dir().is_dir() {
        report.issue("snapshot folder does not exist");
        return Ok(report);
    }

    let archive = folder.archive()?;
    report.detail(format!("archive={}", archive.display()));
    Ok(report)
}
