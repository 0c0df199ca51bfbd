use std::env;
use std::path::PathBuf;

fn home_dir_or_cwd() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

/// `$REPOSTATS_HOME`, or `~/.repostats`.
pub fn repostats_home() -> PathBuf {
    env_or_default_path("REPOSTATS_HOME", home_dir_or_cwd().join(".repostats"))
}

pub fn default_workspace_dir() -> PathBuf {
    repostats_home().join("workspace")
}

pub fn config_file_path() -> PathBuf {
    env_or_default_path("REPOSTATS_CONFIG_PATH", repostats_home().join("config.toml"))
}
