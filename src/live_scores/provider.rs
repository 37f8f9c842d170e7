use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::models::StoredMatch;

/// Trait that every match-data provider must implement.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Return every match scheduled on `date`, played or not.
    async fn fetch_matches(&self, date: NaiveDate) -> Result<Vec<StoredMatch>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
