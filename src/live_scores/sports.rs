use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use tracing::debug;

use super::provider::ScoreProvider;
use crate::db::models::StoredMatch;

/// Match-data provider backed by TheSportsDB v1 JSON API.
/// Docs: <https://www.thesportsdb.com/api.php>
pub struct TheSportsDB {
    http: Client,
    api_key: String,
    /// Base URL for overriding in tests
    base_url: String,
}

impl TheSportsDB {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(TheSportsDB {
            http,
            // "3" is TheSportsDB's public free-tier key; replace with a paid key for higher limits
            api_key: api_key.unwrap_or("3").to_string(),
            base_url: base_url
                .unwrap_or("https://www.thesportsdb.com/api/v1/json")
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl ScoreProvider for TheSportsDB {
    fn name(&self) -> &str {
        "TheSportsDB"
    }

    async fn fetch_matches(&self, date: NaiveDate) -> Result<Vec<StoredMatch>> {
        let url = format!(
            "{}/{}/eventsday.php?d={}&s=Soccer",
            self.base_url,
            self.api_key,
            date.format("%Y-%m-%d")
        );
        debug!("Fetching matches from {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("TheSportsDB request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("TheSportsDB error: {}", resp.status());
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse TheSportsDB response")?;

        Ok(parse_events_response(&raw, date))
    }
}

/// Goal fields come as strings, integers or null depending on the endpoint.
/// Anything unparseable means "not played yet".
fn parse_goals(v: &serde_json::Value) -> i32 {
    v.as_str()
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| v.as_i64().and_then(|n| i32::try_from(n).ok()))
        .unwrap_or(-1)
}

fn parse_events_response(raw: &serde_json::Value, date: NaiveDate) -> Vec<StoredMatch> {
    let events = match raw["events"].as_array() {
        Some(a) => a,
        None => return vec![],
    };

    let now = Utc::now();
    events
        .iter()
        .filter_map(|ev| {
            let match_id = ev["idEvent"].as_str()?.to_string();
            let home_team = ev["strHomeTeam"].as_str()?.to_string();
            let away_team = ev["strAwayTeam"].as_str()?.to_string();
            let match_date = ev["dateEvent"]
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .unwrap_or(date);

            Some(StoredMatch {
                match_id,
                match_date,
                league: ev["strLeague"].as_str().unwrap_or("unknown").to_string(),
                home_team,
                away_team,
                home_goals: parse_goals(&ev["intHomeScore"]),
                away_goals: parse_goals(&ev["intAwayScore"]),
                status: ev["strStatus"].as_str().unwrap_or("NS").to_string(),
                updated_at: now,
            })
        })
        .collect()
}

/// Describe what changed between two stored versions of a match, for logging.
/// Returns `None` if nothing a widget shows has changed.
pub fn describe_change(prev: &StoredMatch, curr: &StoredMatch) -> Option<&'static str> {
    if curr.home_goals > prev.home_goals && prev.home_goals >= 0 {
        Some("goal_home")
    } else if curr.away_goals > prev.away_goals && prev.away_goals >= 0 {
        Some("goal_away")
    } else if curr.home_goals != prev.home_goals || curr.away_goals != prev.away_goals {
        Some("score_change")
    } else if curr.status != prev.status {
        Some("status_change")
    } else if curr.home_team != prev.home_team || curr.away_team != prev.away_team {
        Some("teams_change")
    } else {
        None
    }
}
