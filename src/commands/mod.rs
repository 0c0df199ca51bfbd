pub mod archive;
pub mod clean;
pub mod collect;
pub mod status;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// `--date` value, or the current UTC day.
pub fn resolve_day(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date `{raw}`; expected YYYY-MM-DD")),
        None => Ok(Utc::now().date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_flip_ok() {
        let mut report = CommandReport::new("status");
        report.detail("repository=octo/demo");
        assert!(report.ok);
        report.issue("token missing");
        assert!(!report.ok);
        assert_eq!(report.issues, ["token missing"]);
    }

    #[test]
    fn resolve_day_parses_explicit_dates() {
        let day = resolve_day(Some("2024-02-29")).expect("date");
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid"));
        assert!(resolve_day(Some("29/02/2024")).is_err());
    }
}
