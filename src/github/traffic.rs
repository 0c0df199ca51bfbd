use crate::error::RepoStatsError;
use crate::github::Repository;
use crate::stats::metric::{RankedKind, SeriesMetric};
use crate::stats::ranked::RankedEntry;
use crate::stats::series::MetricEvent;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// Where traffic numbers come from. The collector only depends on this, so
/// it can run against a canned source.
pub trait TrafficSource {
    fn daily_events(&self, metric: SeriesMetric) -> Result<Vec<MetricEvent>>;
    fn ranked(&self, kind: RankedKind) -> Result<Vec<RankedEntry>>;
}

#[derive(Debug, Deserialize)]
struct Referrer {
    referrer: String,
    count: u64,
    uniques: u64,
}

#[derive(Debug, Deserialize)]
struct PopularPath {
    path: String,
    #[serde(default)]
    title: String,
    count: u64,
    uniques: u64,
}

impl From<Referrer> for RankedEntry {
    fn from(item: Referrer) -> Self {
        RankedEntry::referrer(item.referrer, item.count, item.uniques)
    }
}

impl From<PopularPath> for RankedEntry {
    fn from(item: PopularPath) -> Self {
        RankedEntry::path(item.path, item.title, item.count, item.uniques)
    }
}

pub struct TrafficClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TrafficClient {
    pub fn new(
        api_base: &str,
        repository: &Repository,
        token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("repostats/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: traffic_base_url(api_base, repository),
            token: token.to_string(),
        })
    }

    /// GET `{base}/{resource}` and return the JSON body. Any non-2xx status is
    /// an error; nothing is retried.
    pub fn get_json(&self, resource: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, resource.trim_start_matches('/'));
        debug!(url = %url, "requesting traffic resource");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, ACCEPT_JSON)
            .header(API_VERSION_HEADER, API_VERSION)
            .query(query)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoStatsError::UpstreamStatus {
                resource: resource.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let json: Value = response
            .json()
            .with_context(|| format!("failed to parse {resource} response"))?;
        Ok(json)
    }
}

fn traffic_base_url(api_base: &str, repository: &Repository) -> String {
    format!(
        "{}/repos/{}/{}/traffic",
        api_base.trim_end_matches('/'),
        repository.owner,
        repository.name
    )
}

/// Pull the event list out of a `views`/`clones` response body.
pub fn parse_daily_events(metric: SeriesMetric, mut body: Value) -> Result<Vec<MetricEvent>> {
    let events = body
        .get_mut(metric.name())
        .map(Value::take)
        .with_context(|| format!("{metric} response has no `{}` list", metric.name()))?;
    serde_json::from_value(events).with_context(|| format!("malformed {metric} events"))
}

pub fn parse_ranked(kind: RankedKind, body: Value) -> Result<Vec<RankedEntry>> {
    let rows = match kind {
        RankedKind::ReferralSources => serde_json::from_value::<Vec<Referrer>>(body)
            .map(|items| items.into_iter().map(RankedEntry::from).collect()),
        RankedKind::ReferralPaths => serde_json::from_value::<Vec<PopularPath>>(body)
            .map(|items| items.into_iter().map(RankedEntry::from).collect()),
    };
    rows.with_context(|| format!("malformed {kind} response"))
}

impl TrafficSource for TrafficClient {
    fn daily_events(&self, metric: SeriesMetric) -> Result<Vec<MetricEvent>> {
        let body = self.get_json(metric.resource(), &[("per", "day")])?;
        parse_daily_events(metric, body)
    }

    fn ranked(&self, kind: RankedKind) -> Result<Vec<RankedEntry>> {
        let body = self.get_json(kind.resource(), &[])?;
        parse_ranked(kind, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_targets_repository_traffic() {
        let repo: Repository = "octo/demo".parse().expect("repo");
        assert_eq!(
            traffic_base_url("https://api.github.com/", &repo),
            "https://api.github.com/repos/octo/demo/traffic"
        );
    }

    #[test]
    fn parses_views_payload() {
        let body = json!({
            "count": 15,
            "uniques": 11,
            "views": [
                {"timestamp": "2024-01-01T00:00:00Z", "count": 10, "uniques": 8},
                {"timestamp": "2024-01-02T00:00:00Z", "count": 5, "uniques": 3}
            ]
        });

        let events = parse_daily_events(SeriesMetric::Views, body).expect("events");

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].count, 5);
        assert_eq!(events[1].timestamp.to_rfc3339(), "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn missing_event_list_is_an_error() {
        let body = json!({"count": 0, "uniques": 0, "views": []});
        assert!(parse_daily_events(SeriesMetric::Clones, body).is_err());
    }

    #[test]
    fn parses_ranked_payloads() {
        let sources = parse_ranked(
            RankedKind::ReferralSources,
            json!([{"referrer": "github.com", "count": 4, "uniques": 2}]),
        )
        .expect("sources");
        assert_eq!(sources, vec![RankedEntry::referrer("github.com", 4, 2)]);

        let paths = parse_ranked(
            RankedKind::ReferralPaths,
            json!([{"path": "/octo/demo", "title": "demo", "count": 9, "uniques": 1}]),
        )
        .expect("paths");
        assert_eq!(paths, vec![RankedEntry::path("/octo/demo", "demo", 9, 1)]);
    }

    #[test]
    fn ranked_payload_shape_is_enforced() {
        let err = parse_ranked(RankedKind::ReferralPaths, json!({"message": "Not Found"}));
        assert!(err.is_err());
    }
}
