use anyhow::Result;

use crate::commands::CommandReport;
use crate::stats::config::{ConfigOverrides, load_config, unknown_env_keys};
use crate::stats::metric::{RankedKind, SeriesMetric};
use crate::stats::paths::config_file_path;

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub overrides: ConfigOverrides,
}

fn presence(exists: bool) -> &'static str {
    if exists { "present" } else { "missing" }
}

pub fn run(opts: &StatusOptions) -> Result<CommandReport> {
    let cfg = load_config(&opts.overrides)?;
    let mut report = CommandReport::new("status");

    let config_file = config_file_path();
    report.detail(format!(
        "config_file={} ({})",
        config_file.display(),
        presence(config_file.is_file())
    ));
    report.detail(format!("api_base={}", cfg.github.api_base));
    report.detail(format!("timeout_secs={}", cfg.github.timeout_secs));
    report.detail(format!("workspace={}", cfg.workspace.root.display()));
    report.detail(format!("zip={}", cfg.run.zip));
    report.detail(format!("delete_snapshot={}", cfg.run.delete_snapshot));

    match cfg.repository() {
        Ok(repo) => report.detail(format!("repository={repo}")),
        Err(err) => report.issue(format!("{err}")),
    }
    match cfg.token() {
        Ok(_) => report.detail("token=set"),
        Err(err) => report.issue(format!("{err}")),
    }

    let mut cumulative = Vec::new();
    for metric in SeriesMetric::ALL {
        cumulative.push((metric.name(), cfg.series_path(metric)));
    }
    for kind in RankedKind::ALL {
        cumulative.push((kind.name(), cfg.ranked_path(kind)));
    }
    for (name, path) in cumulative {
        report.detail(format!(
            "{name}.cumulative={} ({})",
            path.display(),
            presence(path.is_file())
        ));
    }

    for key in unknown_env_keys() {
        report.issue(format!("unknown environment variable {key}"));
    }

    Ok(report)
}
