use anyhow::Result;

use crate::commands::{CommandReport, resolve_day};
use crate::stats::config::{ConfigOverrides, load_config};
use crate::stats::snapshot::{DeleteOutcome, SnapshotFolder};

#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    pub overrides: ConfigOverrides,
    pub date: Option<String>,
}

pub fn run(opts: &CleanOptions) -> Result<CommandReport> {
    let cfg = load_config(&opts.overrides)?;
    let day = resolve_day(opts.date.as_deref())?;
    let mut report = CommandReport::new("clean");

    let folder = SnapshotFolder::locate(&cfg.workspace.root, day);
    report.detail(format!("snapshot_dir={}", folder.dir().display()));
    match folder.delete() {
        DeleteOutcome::Failed(reason) => report.issue(format!("delete failed: {reason}")),
        outcome => report.detail(format!("snapshot_delete={}", outcome.label())),
    }
    Ok(report)
}
