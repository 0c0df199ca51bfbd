use crate::stats::metric::{RankedKind, SeriesMetric};
use crate::stats::ranked::{RankedEntry, save_ranked};
use crate::stats::series::{DailySeries, save_series};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
    Failed(String),
}

impl DeleteOutcome {
    pub fn label(&self) -> String {
        match self {
            DeleteOutcome::Deleted => "deleted".to_string(),
            DeleteOutcome::Missing => "missing".to_string(),
            DeleteOutcome::Failed(reason) => format!("failed ({reason})"),
        }
    }
}

/// The per-day folder that receives one snapshot file per metric.
#[derive(Debug, Clone)]
pub struct SnapshotFolder {
    root: PathBuf,
    day: NaiveDate,
    dir: PathBuf,
}

fn day_stamp(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

impl SnapshotFolder {
    /// Point at `<root>/<YYYY-MM-DD>` without touching the filesystem.
    pub fn locate(root: &Path, day: NaiveDate) -> Self {
        Self {
            root: root.to_path_buf(),
            day,
            dir: root.join(day_stamp(day)),
        }
    }

    /// Locate the folder for `day` and create it if needed.
    pub fn create(root: &Path, day: NaiveDate) -> Result<Self> {
        let folder = Self::locate(root, day);
        fs::create_dir_all(&folder.dir)
            .with_context(|| format!("failed to create {}", folder.dir.display()))?;
        Ok(folder)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, metric: &str) -> PathBuf {
        self.dir.join(format!("{metric}_{}.csv", day_stamp(self.day)))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(format!("{}_snapshot.zip", day_stamp(self.day)))
    }

    pub fn write_series(&self, metric: SeriesMetric, series: &DailySeries) -> Result<PathBuf> {
        let path = self.file_path(metric.name());
        save_series(&path, metric, series)?;
        Ok(path)
    }

    /// Rows are written as received.
    pub fn write_ranked(&self, kind: RankedKind, rows: &[RankedEntry]) -> Result<PathBuf> {
        let path = self.file_path(kind.name());
        save_ranked(&path, kind, rows)?;
        Ok(path)
    }

    /// Compress the folder contents into `<root>/<YYYY-MM-DD>_snapshot.zip`.
    /// Entry names are relative to the folder.
    pub fn archive(&self) -> Result<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.dir, &mut files)
            .with_context(|| format!("failed to read {}", self.dir.display()))?;
        files.sort();

        let archive_path = self.archive_path();
        let out = File::create(&archive_path)
            .with_context(|| format!("failed to create {}", archive_path.display()))?;
        let mut zip = zip::ZipWriter::new(out);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for file in &files {
            let name = entry_name(&self.dir, file)?;
            zip.start_file(name, options)
                .with_context(|| format!("failed to add {} to archive", file.display()))?;
            let mut src =
                File::open(file).with_context(|| format!("failed to read {}", file.display()))?;
            io::copy(&mut src, &mut zip)
                .with_context(|| format!("failed to compress {}", file.display()))?;
        }
        zip.finish()
            .with_context(|| format!("failed to finish {}", archive_path.display()))?;

        info!(path = %archive_path.display(), files = files.len(), "snapshot folder archived");
        Ok(archive_path)
    }

    /// Remove the folder and everything in it. Never fails: a missing folder
    /// or a filesystem error is logged and reported in the outcome.
    pub fn delete(&self) -> DeleteOutcome {
        if !self.dir.exists() {
            info!(path = %self.dir.display(), "snapshot folder not found");
            return DeleteOutcome::Missing;
        }
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!(path = %self.dir.display(), "snapshot folder deleted");
                DeleteOutcome::Deleted
            }
            Err(err) => {
                error!(path = %self.dir.display(), error = %err, "failed to delete snapshot folder");
                DeleteOutcome::Failed(err.to_string())
            }
        }
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn entry_name(base: &Path, file: &Path) -> Result<String> {
    let rel = file
        .strip_prefix(base)
        .with_context(|| format!("{} is outside {}", file.display(), base.display()))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
