use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoStatsError {
    #[error("github token missing: set REPOSTATS_TOKEN, GITHUB_TOKEN, or pass --token")]
    MissingToken,
    #[error("repository must look like `owner/name`, got `{0}`")]
    InvalidRepository(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("traffic request for `{resource}` failed with status {status}")]
    UpstreamStatus { resource: String, status: u16 },
}
