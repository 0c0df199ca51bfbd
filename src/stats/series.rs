use crate::stats::metric::SeriesMetric;
use crate::stats::table::{column_index, field, open_csv, parse_count, write_csv_atomic};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::path::Path;
use tracing::{debug, info, warn};

/// Length of the snapshot window, today included.
pub const SNAPSHOT_DAYS: u64 = 14;

pub const DATE_COLUMN: &str = "_date";

/// One `{timestamp, count, uniques}` item of a views/clones response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricEvent {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub uniques: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyCounts {
    pub total: u64,
    pub unique: u64,
}

impl DailyCounts {
    pub fn new(total: u64, unique: u64) -> Self {
        Self { total, unique }
    }

    /// Field-wise maximum; neither field can go down.
    pub fn max_fields(self, other: DailyCounts) -> DailyCounts {
        DailyCounts {
            total: self.total.max(other.total),
            unique: self.unique.max(other.unique),
        }
    }
}

impl AddAssign for DailyCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.total = self.total.saturating_add(rhs.total);
        self.unique = self.unique.saturating_add(rhs.unique);
    }
}

/// Per-day counts keyed by UTC calendar date, iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySeries {
    days: BTreeMap<NaiveDate, DailyCounts>,
}

impl DailySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn get(&self, day: NaiveDate) -> Option<DailyCounts> {
        self.days.get(&day).copied()
    }

    pub fn insert(&mut self, day: NaiveDate, counts: DailyCounts) {
        self.days.insert(day, counts);
    }

    /// Sum `counts` into the entry for `day`.
    pub fn add(&mut self, day: NaiveDate, counts: DailyCounts) {
        *self.days.entry(day).or_default() += counts;
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, DailyCounts)> + '_ {
        self.days.iter().map(|(d, c)| (*d, *c))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    /// Zero-fill every date in `[start, end]` that has no entry yet.
    pub fn fill_range(&mut self, start: NaiveDate, end: NaiveDate) {
        for day in start.iter_days().take_while(|d| *d <= end) {
            self.days.entry(day).or_default();
        }
    }

    /// Zero-fill every gap between the first and last recorded date.
    pub fn densify(&mut self) {
        if let (Some(start), Some(end)) = (self.first_date(), self.last_date()) {
            self.fill_range(start, end);
        }
    }

    pub fn is_dense(&self) -> bool {
        match (self.first_date(), self.last_date()) {
            (Some(start), Some(end)) => (end - start).num_days() + 1 == self.len() as i64,
            _ => true,
        }
    }
}

impl FromIterator<(NaiveDate, DailyCounts)> for DailySeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, DailyCounts)>>(iter: I) -> Self {
        let mut series = DailySeries::new();
        for (day, counts) in iter {
            series.add(day, counts);
        }
        series
    }
}

/// First day of the snapshot window ending on `today`.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(SNAPSHOT_DAYS - 1))
        .unwrap_or(NaiveDate::MIN)
}

/// Bucket events by UTC date, summing counts for events that land on the
/// same day, then zero-fill the snapshot window ending on `today`.
pub fn aggregate(events: &[MetricEvent], today: NaiveDate) -> DailySeries {
    let mut series: DailySeries = events
        .iter()
        .map(|e| {
            (
                e.timestamp.date_naive(),
                DailyCounts::new(e.count, e.uniques),
            )
        })
        .collect();
    series.fill_range(window_start(today), today);
    series
}

/// Exactly the [`SNAPSHOT_DAYS`] dates ending on `today`; days outside the
/// window are dropped and missing days are zero.
pub fn snapshot_window(series: &DailySeries, today: NaiveDate) -> DailySeries {
    let start = window_start(today);
    start
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|d| (d, series.get(d).unwrap_or_default()))
        .collect()
}

/// Fold a freshly aggregated series into the persisted history.
///
/// Dates only in `fresh` are inserted, dates only in `prior` are kept, and
/// dates in both take the larger value of each field independently. The
/// result is dense from its first to its last date. With no prior history
/// the result is `fresh`, densified.
pub fn merge_cumulative(prior: Option<&DailySeries>, fresh: &DailySeries) -> DailySeries {
    let mut merged = prior.cloned().unwrap_or_default();
    for (day, counts) in fresh.iter() {
        let next = match merged.get(day) {
            Some(old) => old.max_fields(counts),
            None => counts,
        };
        merged.insert(day, next);
    }
    merged.densify();
    debug_assert!(merged.is_dense());
    merged
}

/// Parse a stored date cell. Plain calendar dates are what this tool writes;
/// datetime and RFC 3339 forms are accepted for files written by other tools.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.date());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    Err(anyhow!("invalid date `{raw}`"))
}

pub fn save_series(path: &Path, metric: SeriesMetric, series: &DailySeries) -> Result<()> {
    write_csv_atomic(path, |w| {
        w.write_record([
            DATE_COLUMN.to_string(),
            metric.total_column(),
            metric.unique_column(),
        ])?;
        for (day, counts) in series.iter() {
            w.write_record([
                day.format("%Y-%m-%d").to_string(),
                counts.total.to_string(),
                counts.unique.to_string(),
            ])?;
        }
        Ok(())
    })
}

/// Load a persisted series. Rows sharing a date are summed.
pub fn load_series(path: &Path, metric: SeriesMetric) -> Result<Option<DailySeries>> {
    let Some(mut reader) = open_csv(path)? else {
        return Ok(None);
    };
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();
    let date_idx = column_index(&headers, DATE_COLUMN).unwrap_or(0);
    let total_idx = column_index(&headers, &metric.total_column())?;
    let unique_idx = column_index(&headers, &metric.unique_column())?;

    let mut series = DailySeries::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        let parse = || -> Result<(NaiveDate, DailyCounts)> {
            let day = parse_calendar_date(field(&record, date_idx)?)?;
            let total = parse_count(field(&record, total_idx)?)?;
            let unique = parse_count(field(&record, unique_idx)?)?;
            Ok((day, DailyCounts::new(total, unique)))
        };
        let (day, counts) =
            parse().with_context(|| format!("{} row {}", path.display(), line + 1))?;
        series.add(day, counts);
    }
    Ok(Some(series))
}

/// Prior history for `metric`, or `None` when this is the first run or the
/// stored file cannot be used.
pub fn try_load_series(path: &Path, metric: SeriesMetric) -> Option<DailySeries> {
    match load_series(path, metric) {
        Ok(Some(series)) => {
            debug!(metric = %metric, path = %path.display(), rows = series.len(), "loaded cumulative series");
            Some(series)
        }
        Ok(None) => {
            info!(metric = %metric, path = %path.display(), "no cumulative series yet; starting new record");
            None
        }
        Err(err) => {
            warn!(metric = %metric, path = %path.display(), error = %format!("{err:#}"), "unreadable cumulative series; starting new record");
            None
        }
    }
}
