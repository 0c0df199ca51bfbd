pub mod traffic;

use crate::error::RepoStatsError;
use std::fmt;
use std::str::FromStr;

/// An `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl FromStr for Repository {
    type Err = RepoStatsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim().trim_matches('/');
        let Some((owner, name)) = trimmed.split_once('/') else {
            return Err(RepoStatsError::InvalidRepository(raw.to_string()));
        };
        let valid = |part: &str| !part.trim().is_empty() && !part.contains('/');
        if !valid(owner) || !valid(name) {
            return Err(RepoStatsError::InvalidRepository(raw.to_string()));
        }
        Ok(Self {
            owner: owner.trim().to_string(),
            name: name.trim().to_string(),
        })
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
