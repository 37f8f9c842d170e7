use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The most current known result for one match on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    /// Negative when the match has not been played yet
    pub home_goals: i32,
    pub away_goals: i32,
}

impl MatchSnapshot {
    /// A row with no id or no team names can't be rendered meaningfully.
    pub fn is_garbage(&self) -> bool {
        self.match_id.trim().is_empty()
            || self.home_team.trim().is_empty()
            || self.away_team.trim().is_empty()
    }
}

/// A match row as stored by the score sync loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMatch {
    /// External event ID from the live-score provider
    pub match_id: String,
    pub match_date: NaiveDate,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: i32,
    pub away_goals: i32,
    /// Provider status string, e.g. "Match Finished", "NS", "45"
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// A registered display surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Widget {
    pub id: i64,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// The last view pushed to a widget, stored as raw JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetView {
    pub widget_id: i64,
    pub view: serde_json::Value,
    pub rendered_at: DateTime<Utc>,
}
