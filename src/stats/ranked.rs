use crate::stats::metric::RankedKind;
use crate::stats::table::{column_index, field, open_csv, parse_count, write_csv_atomic};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// A referrer or path row. `title` is only carried for paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub key: String,
    pub title: Option<String>,
    pub count: u64,
    pub uniques: u64,
}

impl RankedEntry {
    pub fn referrer(referrer: impl Into<String>, count: u64, uniques: u64) -> Self {
        Self {
            key: referrer.into(),
            title: None,
            count,
            uniques,
        }
    }

    pub fn path(
        path: impl Into<String>,
        title: impl Into<String>,
        count: u64,
        uniques: u64,
    ) -> Self {
        Self {
            key: path.into(),
            title: Some(title.into()),
            count,
            uniques,
        }
    }
}

/// Combine persisted rows with a fresh fetch.
///
/// Rows are concatenated (prior first) and only the last row per key is
/// kept, so a fresh row replaces the stored one outright and a key repeated
/// within one response resolves to its last occurrence. The result is
/// sorted by count, descending; equal counts keep their concatenation order.
pub fn merge_ranked(prior: Option<Vec<RankedEntry>>, fresh: &[RankedEntry]) -> Vec<RankedEntry> {
    let mut rows = prior.unwrap_or_default();
    rows.extend_from_slice(fresh);

    let mut last_index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        last_index.insert(row.key.clone(), idx);
    }

    let mut merged: Vec<RankedEntry> = rows
        .into_iter()
        .enumerate()
        .filter(|(idx, row)| last_index.get(&row.key) == Some(idx))
        .map(|(_, row)| row)
        .collect();
    merged.sort_by(|a, b| b.count.cmp(&a.count));
    merged
}

pub fn save_ranked(path: &Path, kind: RankedKind, rows: &[RankedEntry]) -> Result<()> {
    write_csv_atomic(path, |w| {
        w.write_record(kind.columns())?;
        for row in rows {
            let count = row.count.to_string();
            let uniques = row.uniques.to_string();
            if kind.has_title() {
                let title = row.title.as_deref().unwrap_or_default();
                w.write_record([row.key.as_str(), title, count.as_str(), uniques.as_str()])?;
            } else {
                w.write_record([row.key.as_str(), count.as_str(), uniques.as_str()])?;
            }
        }
        Ok(())
    })
}

pub fn load_ranked(path: &Path, kind: RankedKind) -> Result<Option<Vec<RankedEntry>>> {
    let Some(mut reader) = open_csv(path)? else {
        return Ok(None);
    };
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();
    let key_idx = column_index(&headers, kind.key_column())?;
    let title_idx = if kind.has_title() {
        Some(column_index(&headers, "title")?)
    } else {
        None
    };
    let count_idx = column_index(&headers, "count")?;
    let uniques_idx = column_index(&headers, "uniques")?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        let parse = || -> Result<RankedEntry> {
            let title = match title_idx {
                Some(idx) => Some(field(&record, idx)?.to_string()),
                None => None,
            };
            Ok(RankedEntry {
                key: field(&record, key_idx)?.to_string(),
                title,
                count: parse_count(field(&record, count_idx)?)?,
                uniques: parse_count(field(&record, uniques_idx)?)?,
            })
        };
        rows.push(parse().with_context(|| format!("{} row {}", path.display(), line + 1))?);
    }
    Ok(Some(rows))
}

pub fn try_load_ranked(path: &Path, kind: RankedKind) -> Option<Vec<RankedEntry>> {
    match load_ranked(path, kind) {
        Ok(Some(rows)) => {
            debug!(metric = %kind, path = %path.display(), rows = rows.len(), "loaded ranked table");
            Some(rows)
        }
        Ok(None) => {
            info!(metric = %kind, path = %path.display(), "no ranked table yet; starting new record");
            None
        }
        Err(err) => {
            warn!(metric = %kind, path = %path.display(), error = %format!("{err:#}"), "unreadable ranked table; starting new record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn keys(rows: &[RankedEntry]) -> Vec<&str> {
        rows.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn fresh_row_replaces_stored_row_for_same_key() {
        let prior = vec![
            RankedEntry::referrer("github.com", 5, 2),
            RankedEntry::referrer("google.com", 7, 7),
        ];
        let fresh = [RankedEntry::referrer("github.com", 10, 1)];

        let merged = merge_ranked(Some(prior), &fresh);

        assert_eq!(keys(&merged), ["github.com", "google.com"]);
        assert_eq!(merged[0], RankedEntry::referrer("github.com", 10, 1));
    }

    #[test]
    fn fresh_row_wins_even_with_lower_count() {
        let prior = vec![RankedEntry::referrer("news.ycombinator.com", 40, 30)];
        let fresh = [RankedEntry::referrer("news.ycombinator.com", 3, 3)];

        let merged = merge_ranked(Some(prior), &fresh);

        assert_eq!(merged, vec![RankedEntry::referrer("news.ycombinator.com", 3, 3)]);
    }

    #[test]
    fn duplicate_keys_in_one_response_keep_the_last() {
        let fresh = [
            RankedEntry::path("/a", "A", 4, 1),
            RankedEntry::path("/b", "B", 2, 2),
            RankedEntry::path("/a", "A again", 1, 1),
        ];

        let merged = merge_ranked(None, &fresh);

        assert_eq!(
            merged,
            vec![
                RankedEntry::path("/b", "B", 2, 2),
                RankedEntry::path("/a", "A again", 1, 1),
            ]
        );
    }

    #[test]
    fn merged_rows_are_sorted_descending_with_stable_ties() {
        let prior = vec![
            RankedEntry::referrer("a", 3, 1),
            RankedEntry::referrer("b", 9, 1),
        ];
        let fresh = [
            RankedEntry::referrer("c", 3, 1),
            RankedEntry::referrer("d", 12, 1),
        ];

        let merged = merge_ranked(Some(prior), &fresh);

        assert_eq!(keys(&merged), ["d", "b", "a", "c"]);
    }

    #[test]
    fn first_run_is_fresh_rows_sorted() {
        let fresh = [
            RankedEntry::referrer("x", 1, 1),
            RankedEntry::referrer("y", 2, 1),
        ];
        let merged = merge_ranked(None, &fresh);
        assert_eq!(keys(&merged), ["y", "x"]);
    }

    #[test]
    fn saved_paths_read_back_unchanged() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("referral_paths.csv");
        let rows = merge_ranked(
            None,
            &[
                RankedEntry::path("/owner/repo", "GitHub - owner/repo: a, quoted \"title\"", 20, 9),
                RankedEntry::path("/owner/repo/issues", "", 4, 2),
            ],
        );

        save_ranked(&path, RankedKind::ReferralPaths, &rows).expect("save");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.starts_with("path,title,count,uniques\n"));

        let loaded = load_ranked(&path, RankedKind::ReferralPaths)
            .expect("load")
            .expect("present");
        assert_eq!(merge_ranked(Some(loaded), &[]), rows);
    }

    #[test]
    fn saved_sources_have_no_title_column() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("referral_sources.csv");
        save_ranked(
            &path,
            RankedKind::ReferralSources,
            &[RankedEntry::referrer("github.com", 3, 2)],
        )
        .expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw, "referrer,count,uniques\ngithub.com,3,2\n");
    }

    #[test]
    fn unreadable_table_falls_back_to_first_run() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("referral_sources.csv");
        fs::write(&path, "path,title,count,uniques\n/a,A,1,1\n").expect("seed");

        assert!(try_load_ranked(&path, RankedKind::ReferralSources).is_none());
        assert!(try_load_ranked(&tmp.path().join("absent.csv"), RankedKind::ReferralSources).is_none());
    }
}
