use std::fmt;

/// Daily time-series metrics served by the traffic API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMetric {
    Views,
    Clones,
}

impl SeriesMetric {
    pub const ALL: [SeriesMetric; 2] = [SeriesMetric::Views, SeriesMetric::Clones];

    pub fn name(self) -> &'static str {
        match self {
            SeriesMetric::Views => "views",
            SeriesMetric::Clones => "clones",
        }
    }

    /// Sub-resource under `.../traffic/`. The response object carries the
    /// event list under the same key.
    pub fn resource(self) -> &'static str {
        self.name()
    }

    pub fn total_column(self) -> String {
        format!("total_{}", self.name())
    }

    pub fn unique_column(self) -> String {
        format!("unique_{}", self.name())
    }
}

impl fmt::Display for SeriesMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankedKind {
    ReferralSources,
    ReferralPaths,
}

impl RankedKind {
    pub const ALL: [RankedKind; 2] = [RankedKind::ReferralSources, RankedKind::ReferralPaths];

    pub fn name(self) -> &'static str {
        match self {
            RankedKind::ReferralSources => "referral_sources",
            RankedKind::ReferralPaths => "referral_paths",
        }
    }

    pub fn resource(self) -> &'static str {
        match self {
            RankedKind::ReferralSources => "popular/referrers",
            RankedKind::ReferralPaths => "popular/paths",
        }
    }

    /// Column that identifies a row for deduplication.
    pub fn key_column(self) -> &'static str {
        match self {
            RankedKind::ReferralSources => "referrer",
            RankedKind::ReferralPaths => "path",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            RankedKind::ReferralSources => &["referrer", "count", "uniques"],
            RankedKind::ReferralPaths => &["path", "title", "count", "uniques"],
        }
    }

    pub fn has_title(self) -> bool {
        matches!(self, RankedKind::ReferralPaths)
    }
}

impl fmt::Display for RankedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
