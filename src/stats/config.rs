use crate::error::RepoStatsError;
use crate::github::Repository;
use crate::stats::metric::{RankedKind, SeriesMetric};
use crate::stats::paths::{config_file_path, default_workspace_dir};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

include!(concat!(env!("OUT_DIR"), "/repostats_env_allowlist.rs"));

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const ENV_PREFIX: &str = "REPOSTATS_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub repository: String,
    pub token: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_dir(),
        }
    }
}

/// Cumulative file per metric. Unset entries live in the workspace root.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CumulativeConfig {
    pub views: Option<PathBuf>,
    pub clones: Option<PathBuf>,
    pub referral_sources: Option<PathBuf>,
    pub referral_paths: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub zip: bool,
    pub delete_snapshot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepoStatsConfig {
    pub github: GithubConfig,
    pub workspace: WorkspaceConfig,
    pub cumulative: CumulativeConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRepoStatsConfig {
    github: Option<GithubConfig>,
    workspace: Option<WorkspaceConfig>,
    cumulative: Option<CumulativeConfig>,
    run: Option<RunConfig>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub repository: Option<String>,
    pub token: Option<String>,
    pub workspace: Option<PathBuf>,
    pub zip: bool,
    pub delete_snapshot: bool,
}

impl RepoStatsConfig {
    pub fn repository(&self) -> Result<Repository> {
        Ok(self.github.repository.parse::<Repository>()?)
    }

    pub fn token(&self) -> Result<&str> {
        match self.github.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token.trim()),
            _ => Err(RepoStatsError::MissingToken.into()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.github.timeout_secs)
    }

    fn cumulative_or_default(&self, configured: &Option<PathBuf>, name: &str) -> PathBuf {
        configured
            .clone()
            .unwrap_or_else(|| self.workspace.root.join(format!("{name}.csv")))
    }

    pub fn series_path(&self, metric: SeriesMetric) -> PathBuf {
        let configured = match metric {
            SeriesMetric::Views => &self.cumulative.views,
            SeriesMetric::Clones => &self.cumulative.clones,
        };
        self.cumulative_or_default(configured, metric.name())
    }

    pub fn ranked_path(&self, kind: RankedKind) -> PathBuf {
        let configured = match kind {
            RankedKind::ReferralSources => &self.cumulative.referral_sources,
            RankedKind::ReferralPaths => &self.cumulative.referral_paths,
        };
        self.cumulative_or_default(configured, kind.name())
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_first(vars: &[&str]) -> Option<String> {
    vars.iter().find_map(|var| env_non_empty(var))
}

fn env_or_path(var: &str, fallback: Option<PathBuf>) -> Option<PathBuf> {
    env_non_empty(var).map(PathBuf::from).or(fallback)
}

/// Repository syntax is checked by `repository()` where it is used.
fn validate(cfg: &RepoStatsConfig) -> Result<()> {
    let base = cfg.github.api_base.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(anyhow!(
            "invalid api base `{base}`: must start with http:// or https://"
        ));
    }
    if cfg.github.timeout_secs == 0 {
        return Err(anyhow!("invalid request timeout: must be >= 1 second"));
    }
    if cfg.workspace.root.as_os_str().is_empty() {
        return Err(anyhow!("invalid workspace root: cannot be empty"));
    }
    Ok(())
}

fn parse_file_config(raw: &str, path: &Path) -> Result<PartialRepoStatsConfig> {
    toml::from_str(raw).map_err(|err| {
        RepoStatsError::InvalidConfig(format!("{}: {err}", path.display())).into()
    })
}

fn apply_partial(base: &mut RepoStatsConfig, parsed: PartialRepoStatsConfig) {
    if let Some(github) = parsed.github {
        base.github = github;
    }
    if let Some(workspace) = parsed.workspace {
        base.workspace = workspace;
    }
    if let Some(cumulative) = parsed.cumulative {
        base.cumulative = cumulative;
    }
    if let Some(run) = parsed.run {
        base.run = run;
    }
}

fn merge_file_config(base: &mut RepoStatsConfig) -> Result<()> {
    let path = config_file_path();
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path).map_err(|err| {
        RepoStatsError::InvalidConfig(format!("{}: {err}", path.display()))
    })?;
    let parsed = parse_file_config(&raw, &path)?;
    apply_partial(base, parsed);
    Ok(())
}

fn merge_env(cfg: &mut RepoStatsConfig) {
    if let Some(repo) = env_non_empty("REPOSTATS_REPO") {
        cfg.github.repository = repo;
    }
    if let Some(token) = env_first(&["REPOSTATS_TOKEN", "GITHUB_TOKEN"]) {
        cfg.github.token = Some(token);
    }
    if let Some(base) = env_non_empty("REPOSTATS_API_BASE") {
        cfg.github.api_base = base;
    }
    cfg.github.timeout_secs = env_or_u64("REPOSTATS_TIMEOUT_SECS", cfg.github.timeout_secs);
    if let Some(root) = env_non_empty("REPOSTATS_WORKSPACE") {
        cfg.workspace.root = PathBuf::from(root);
    }
    cfg.cumulative.views = env_or_path("REPOSTATS_VIEWS_PATH", cfg.cumulative.views.take());
    cfg.cumulative.clones = env_or_path("REPOSTATS_CLONES_PATH", cfg.cumulative.clones.take());
    cfg.cumulative.referral_sources = env_or_path(
        "REPOSTATS_REFERRERS_PATH",
        cfg.cumulative.referral_sources.take(),
    );
    cfg.cumulative.referral_paths =
        env_or_path("REPOSTATS_PATHS_PATH", cfg.cumulative.referral_paths.take());
    cfg.run.zip = env_or_bool("REPOSTATS_ZIP", cfg.run.zip);
    cfg.run.delete_snapshot = env_or_bool("REPOSTATS_DELETE_SNAPSHOT", cfg.run.delete_snapshot);
}

fn apply_overrides(cfg: &mut RepoStatsConfig, overrides: &ConfigOverrides) {
    if let Some(repo) = overrides.repository.as_ref() {
        cfg.github.repository = repo.clone();
    }
    if let Some(token) = overrides.token.as_ref() {
        cfg.github.token = Some(token.clone());
    }
    if let Some(root) = overrides.workspace.as_ref() {
        cfg.workspace.root = root.clone();
    }
    cfg.run.zip |= overrides.zip;
    cfg.run.delete_snapshot |= overrides.delete_snapshot;
}

pub fn load_config(overrides: &ConfigOverrides) -> Result<RepoStatsConfig> {
    let mut cfg = RepoStatsConfig::default();
    merge_file_config(&mut cfg)?;
    merge_env(&mut cfg);
    apply_overrides(&mut cfg, overrides);

    validate(&cfg)?;
    Ok(cfg)
}

/// `REPOSTATS_*` variables in the environment that nothing reads,
/// usually typos.
pub fn unknown_env_keys() -> Vec<String> {
    let mut unknown: Vec<String> = env::vars_os()
        .filter_map(|(key, _)| key.into_string().ok())
        .filter(|key| key.starts_with(ENV_PREFIX))
        .filter(|key| !GENERATED_REPOSTATS_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    unknown.sort();
    unknown
}
