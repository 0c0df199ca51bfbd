use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write a CSV table through a temp file in the target directory and move it
/// over `path` once complete. A failed write leaves the previous file intact.
pub fn write_csv_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<&mut File>) -> Result<()>,
{
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        fill(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", path.display()))?;
    }
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Open a CSV table, or `None` when the file does not exist yet.
pub fn open_csv(path: &Path) -> Result<Option<csv::Reader<File>>> {
    if !path.exists() {
        return Ok(None);
    }
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Some(reader))
}

pub fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow!("missing column `{name}`"))
}

pub fn field<'r>(record: &'r StringRecord, idx: usize) -> Result<&'r str> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| anyhow!("row has no column {idx}"))
}

/// Counts are whole numbers, but tables written by dataframe tools can carry
/// them as `5.0`.
pub fn parse_count(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<u64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(anyhow!("invalid count `{raw}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_count_accepts_integral_floats() {
        assert_eq!(parse_count("12").expect("int"), 12);
        assert_eq!(parse_count(" 7.0 ").expect("float"), 7);
        assert!(parse_count("1.5").is_err());
        assert!(parse_count("-3").is_err());
        assert!(parse_count("").is_err());
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("nested/table.csv");

        write_csv_atomic(&path, |w| {
            w.write_record(["a", "b"])?;
            w.write_record(["1", "2"])?;
            Ok(())
        })
        .expect("first write");
        write_csv_atomic(&path, |w| {
            w.write_record(["a", "b"])?;
            Ok(())
        })
        .expect("second write");

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw, "a,b\n");
        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn failed_fill_keeps_previous_contents() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("table.csv");
        fs::write(&path, "old\n").expect("seed");

        let err = write_csv_atomic(&path, |_| Err(anyhow!("boom")));
        assert!(err.is_err());
        assert_eq!(fs::read_to_string(&path).expect("read"), "old\n");
    }

    #[test]
    fn open_csv_reports_missing_file_as_none() {
        let tmp = tempdir().expect("tempdir");
        assert!(open_csv(&tmp.path().join("absent.csv")).expect("open").is_none());
    }
}
