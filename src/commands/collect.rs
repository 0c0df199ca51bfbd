use anyhow::Result;
use chrono::Utc;

use crate::commands::CommandReport;
use crate::github::traffic::TrafficClient;
use crate::stats::collect::{CollectPlan, run_collect};
use crate::stats::config::{ConfigOverrides, load_config};
use crate::stats::metric::{RankedKind, SeriesMetric};

#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub overrides: ConfigOverrides,
}

pub fn run(opts: &CollectOptions) -> Result<CommandReport> {
    let cfg = load_config(&opts.overrides)?;
    let repository = cfg.repository()?;
    let token = cfg.token()?;
    let mut report = CommandReport::new("collect");

    let client = TrafficClient::new(&cfg.github.api_base, &repository, token, cfg.timeout())?;
    let plan = CollectPlan {
        workspace: cfg.workspace.root.clone(),
        today: Utc::now().date_naive(),
        views_path: cfg.series_path(SeriesMetric::Views),
        clones_path: cfg.series_path(SeriesMetric::Clones),
        referral_sources_path: cfg.ranked_path(RankedKind::ReferralSources),
        referral_paths_path: cfg.ranked_path(RankedKind::ReferralPaths),
        zip: cfg.run.zip,
        delete_snapshot: cfg.run.delete_snapshot,
    };

    report.detail(format!("repository={repository}"));
    report.detail(format!("day={}", plan.today.format("%Y-%m-%d")));

    let outcome = run_collect(&client, &plan)?;
    report.detail(format!("snapshot_dir={}", outcome.snapshot_dir.display()));
    for metric in &outcome.metrics {
        report.detail(format!(
            "{}.snapshot={} rows={}",
            metric.metric,
            metric.snapshot_path.display(),
            metric.snapshot_rows
        ));
        report.detail(format!(
            "{}.cumulative={} rows={} history={}",
            metric.metric,
            metric.cumulative_path.display(),
            metric.cumulative_rows,
            if metric.had_history { "merged" } else { "new" }
        ));
    }
    if let Some(path) = outcome.archive_path {
        report.detail(format!("archive={}", path.display()));
    }
    if let Some(delete) = outcome.delete {
        report.detail(format!("snapshot_delete={}", delete.label()));
    }

    Ok(report)
}
