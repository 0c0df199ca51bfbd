use crate::github::traffic::TrafficSource;
use crate::stats::metric::{RankedKind, SeriesMetric};
use crate::stats::ranked::{merge_ranked, save_ranked, try_load_ranked};
use crate::stats::series::{aggregate, merge_cumulative, save_series, snapshot_window, try_load_series};
use crate::stats::snapshot::{DeleteOutcome, SnapshotFolder};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where one run reads from and writes to.
#[derive(Debug, Clone)]
pub struct CollectPlan {
    pub workspace: PathBuf,
    pub today: NaiveDate,
    pub views_path: PathBuf,
    pub clones_path: PathBuf,
    pub referral_sources_path: PathBuf,
    pub referral_paths_path: PathBuf,
    pub zip: bool,
    pub delete_snapshot: bool,
}

impl CollectPlan {
    fn series_path(&self, metric: SeriesMetric) -> &Path {
        match metric {
            SeriesMetric::Views => &self.views_path,
            SeriesMetric::Clones => &self.clones_path,
        }
    }

    fn ranked_path(&self, kind: RankedKind) -> &Path {
        match kind {
            RankedKind::ReferralSources => &self.referral_sources_path,
            RankedKind::ReferralPaths => &self.referral_paths_path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricOutcome {
    pub metric: &'static str,
    pub snapshot_path: PathBuf,
    pub snapshot_rows: usize,
    pub cumulative_path: PathBuf,
    pub cumulative_rows: usize,
    pub had_history: bool,
}

#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub snapshot_dir: PathBuf,
    pub metrics: Vec<MetricOutcome>,
    pub archive_path: Option<PathBuf>,
    pub delete: Option<DeleteOutcome>,
}

fn collect_series(
    source: &dyn TrafficSource,
    folder: &SnapshotFolder,
    metric: SeriesMetric,
    cumulative_path: &Path,
    today: NaiveDate,
) -> Result<MetricOutcome> {
    let events = source
        .daily_events(metric)
        .with_context(|| format!("failed to fetch {metric}"))?;
    let fresh = aggregate(&events, today);

    let snapshot = snapshot_window(&fresh, today);
    let snapshot_path = folder.write_series(metric, &snapshot)?;

    let prior = try_load_series(cumulative_path, metric);
    let had_history = prior.is_some();
    info!(metric = %metric, events = events.len(), had_history, "merging cumulative series");
    let merged = merge_cumulative(prior.as_ref(), &fresh);
    save_series(cumulative_path, metric, &merged)?;

    Ok(MetricOutcome {
        metric: metric.name(),
        snapshot_path,
        snapshot_rows: snapshot.len(),
        cumulative_path: cumulative_path.to_path_buf(),
        cumulative_rows: merged.len(),
        had_history,
    })
}

fn collect_ranked(
    source: &dyn TrafficSource,
    folder: &SnapshotFolder,
    kind: RankedKind,
    cumulative_path: &Path,
) -> Result<MetricOutcome> {
    let fresh = source
        .ranked(kind)
        .with_context(|| format!("failed to fetch {kind}"))?;
    let snapshot_path = folder.write_ranked(kind, &fresh)?;

    let prior = try_load_ranked(cumulative_path, kind);
    let had_history = prior.is_some();
    info!(metric = %kind, rows = fresh.len(), had_history, "merging ranked table");
    let merged = merge_ranked(prior, &fresh);
    save_ranked(cumulative_path, kind, &merged)?;

    Ok(MetricOutcome {
        metric: kind.name(),
        snapshot_path,
        snapshot_rows: fresh.len(),
        cumulative_path: cumulative_path.to_path_buf(),
        cumulative_rows: merged.len(),
        had_history,
    })
}

/// Optional archive, then optional delete. A failed delete only shows up in
/// the outcome; archive errors abort.
fn finish_snapshot(
    folder: &SnapshotFolder,
    plan: &CollectPlan,
) -> Result<(Option<PathBuf>, Option<DeleteOutcome>)> {
    let archive_path = if plan.zip {
        Some(folder.archive()?)
    } else {
        None
    };
    let delete = plan.delete_snapshot.then(|| folder.delete());
    Ok((archive_path, delete))
}

/// Fetch every metric in turn, write its snapshot, and fold it into its
/// cumulative file. The first fetch error aborts the run.
pub fn run_collect(source: &dyn TrafficSource, plan: &CollectPlan) -> Result<CollectOutcome> {
    let folder = SnapshotFolder::create(&plan.workspace, plan.today)?;
    let mut metrics = Vec::with_capacity(SeriesMetric::ALL.len() + RankedKind::ALL.len());

    for metric in SeriesMetric::ALL {
        metrics.push(collect_series(
            source,
            &folder,
            metric,
            plan.series_path(metric),
            plan.today,
        )?);
    }
    for kind in RankedKind::ALL {
        metrics.push(collect_ranked(
            source,
            &folder,
            kind,
            plan.ranked_path(kind),
        )?);
    }

    let (archive_path, delete) = finish_snapshot(&folder, plan)?;

    Ok(CollectOutcome {
        snapshot_dir: folder.dir().to_path_buf(),
        metrics,
        archive_path,
        delete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ranked::{RankedEntry, load_ranked};
    use crate::stats::series::{DailyCounts, MetricEvent, load_series};
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::tempdir;

    struct CannedSource {
        views: Vec<MetricEvent>,
        sources: Vec<RankedEntry>,
        fail_clones: bool,
    }

    impl TrafficSource for CannedSource {
        fn daily_events(&self, metric: SeriesMetric) -> Result<Vec<MetricEvent>> {
            match metric {
                SeriesMetric::Views => Ok(self.views.clone()),
                SeriesMetric::Clones if self.fail_clones => Err(anyhow!("status 401")),
                SeriesMetric::Clones => Ok(Vec::new()),
            }
        }

        fn ranked(&self, kind: RankedKind) -> Result<Vec<RankedEntry>> {
            match kind {
                RankedKind::ReferralSources => Ok(self.sources.clone()),
                RankedKind::ReferralPaths => Ok(vec![RankedEntry::path("/o/r", "r", 1, 1)]),
            }
        }
    }

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    fn plan(root: &Path, today: NaiveDate) -> CollectPlan {
        CollectPlan {
            workspace: root.to_path_buf(),
            today,
            views_path: root.join("views.csv"),
            clones_path: root.join("clones.csv"),
            referral_sources_path: root.join("referral_sources.csv"),
            referral_paths_path: root.join("referral_paths.csv"),
            zip: false,
            delete_snapshot: false,
        }
    }

    fn canned() -> CannedSource {
        CannedSource {
            views: vec![MetricEvent {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                count: 5,
                uniques: 3,
            }],
            sources: vec![
                RankedEntry::referrer("github.com", 2, 1),
                RankedEntry::referrer("google.com", 8, 4),
            ],
            fail_clones: false,
        }
    }

    #[test]
    fn run_writes_snapshots_and_cumulative_files() {
        let tmp = tempdir().expect("tempdir");
        let plan = plan(tmp.path(), day("2024-01-02"));

        let outcome = run_collect(&canned(), &plan).expect("collect");

        assert_eq!(outcome.snapshot_dir, tmp.path().join("2024-01-02"));
        let names: Vec<&str> = outcome.metrics.iter().map(|m| m.metric).collect();
        assert_eq!(names, ["views", "clones", "referral_sources", "referral_paths"]);
        assert!(outcome.metrics.iter().all(|m| m.snapshot_path.exists()));
        assert!(outcome.metrics.iter().all(|m| !m.had_history));
        assert_eq!(outcome.metrics[0].snapshot_rows, 14);

        let views = load_series(&plan.views_path, SeriesMetric::Views)
            .expect("load")
            .expect("present");
        assert_eq!(views.get(day("2024-01-02")), Some(DailyCounts::new(5, 3)));

        // Snapshot keeps fetch order; the cumulative table is ranked.
        let snapshot = fs::read_to_string(&outcome.metrics[2].snapshot_path).expect("read");
        assert_eq!(snapshot, "referrer,count,uniques\ngithub.com,2,1\ngoogle.com,8,4\n");
        let ranked = load_ranked(&plan.referral_sources_path, RankedKind::ReferralSources)
            .expect("load")
            .expect("present");
        assert_eq!(ranked[0].key, "google.com");
    }

    #[test]
    fn second_run_merges_into_history() {
        let tmp = tempdir().expect("tempdir");
        run_collect(&canned(), &plan(tmp.path(), day("2024-01-02"))).expect("first");

        let mut later = canned();
        later.views = vec![MetricEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            count: 1,
            uniques: 1,
        }];
        let plan = plan(tmp.path(), day("2024-01-10"));
        let outcome = run_collect(&later, &plan).expect("second");

        assert!(outcome.metrics.iter().all(|m| m.had_history));
        let views = load_series(&plan.views_path, SeriesMetric::Views)
            .expect("load")
            .expect("present");
        assert!(views.is_dense());
        assert_eq!(views.first_date(), Some(day("2023-12-20")));
        assert_eq!(views.last_date(), Some(day("2024-01-10")));
        // Older window still holds the count it had when it was first seen.
        assert_eq!(views.get(day("2024-01-02")), Some(DailyCounts::new(5, 3)));
    }

    #[test]
    fn fetch_failure_aborts_the_run() {
        let tmp = tempdir().expect("tempdir");
        let mut source = canned();
        source.fail_clones = true;

        let err = run_collect(&source, &plan(tmp.path(), day("2024-01-02")))
            .expect_err("should fail");

        assert!(format!("{err:#}").contains("failed to fetch clones"));
        assert!(!tmp.path().join("referral_sources.csv").exists());
    }

    #[test]
    fn archive_and_delete_run_after_collection() {
        let tmp = tempdir().expect("tempdir");
        let mut plan = plan(tmp.path(), day("2024-01-02"));
        plan.zip = true;
        plan.delete_snapshot = true;

        let outcome = run_collect(&canned(), &plan).expect("collect");

        let archive = outcome.archive_path.expect("archive");
        assert_eq!(archive, tmp.path().join("2024-01-02_snapshot.zip"));
        assert!(archive.exists());
        assert_eq!(outcome.delete, Some(DeleteOutcome::Deleted));
        assert!(!outcome.snapshot_dir.exists());
        assert!(plan.views_path.exists());
    }

    #[test]
    fn failed_delete_is_reported_not_raised() {
        let tmp = tempdir().expect("tempdir");
        let mut plan = plan(tmp.path(), day("2024-01-02"));
        plan.delete_snapshot = true;
        // A plain file where the folder should be makes the removal fail.
        let folder = SnapshotFolder::locate(tmp.path(), plan.today);
        fs::write(folder.dir(), "not a folder").expect("write");

        let (archive, delete) = finish_snapshot(&folder, &plan).expect("finish");

        assert_eq!(archive, None);
        assert!(matches!(delete, Some(DeleteOutcome::Failed(_))));
        assert!(folder.dir().is_file());
    }
}
