pub mod provider;
pub mod sports;

pub use provider::ScoreProvider;
pub use sports::{describe_change, TheSportsDB};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::net::ConnectivityProbe;
use crate::refresh::{RefreshCause, RefreshHandle};

const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Fetch `date`'s matches from all providers concurrently and store them.
///
/// When several providers report the same match, the first provider in the
/// list wins. Returns how many stored matches changed. Fails only when every
/// provider failed.
pub async fn sync_once(
    providers: &[Arc<dyn ScoreProvider>],
    db: &Database,
    date: NaiveDate,
) -> Result<usize> {
    let fetches = providers.iter().map(|p| {
        let p = Arc::clone(p);
        async move { (p.name().to_string(), p.fetch_matches(date).await) }
    });
    let results = futures_util::future::join_all(fetches).await;

    let mut seen = HashSet::new();
    let mut any_ok = false;
    let mut changed = 0;
    for (provider_name, result) in results {
        let matches = match result {
            Ok(m) => m,
            Err(e) => {
                warn!("Provider '{}' failed: {:#}", provider_name, e);
                continue;
            }
        };
        any_ok = true;
        for m in matches {
            if !seen.insert(m.match_id.clone()) {
                continue;
            }
            let prev = db.get_match(&m.match_id)?;
            if db.upsert_match(&m)? {
                changed += 1;
                let what = prev
                    .as_ref()
                    .and_then(|p| describe_change(p, &m))
                    .unwrap_or("new_match");
                info!(
                    "Match update: {} {}-{} {} ({}, via {})",
                    m.home_team, m.home_goals, m.away_goals, m.away_team, what, provider_name
                );
            }
        }
    }

    if !any_ok && !providers.is_empty() {
        anyhow::bail!("all {} provider(s) failed", providers.len());
    }
    Ok(changed)
}

/// What one poll of the sync loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Network down; providers were not contacted.
    Offline,
    Unchanged,
    /// This many stored matches changed and a refresh was requested.
    Changed(usize),
}

/// One poll: check connectivity, sync `today`'s matches, and request a
/// widget refresh only if something stored changed.
pub async fn poll_tick(
    providers: &[Arc<dyn ScoreProvider>],
    db: &Database,
    probe: &ConnectivityProbe,
    refresh: &RefreshHandle,
    today: NaiveDate,
) -> Result<TickOutcome> {
    if !probe.is_network_available().await {
        debug!("Network unavailable, skipping score poll");
        return Ok(TickOutcome::Offline);
    }

    match sync_once(providers, db, today).await? {
        0 => Ok(TickOutcome::Unchanged),
        changed => {
            debug!("{} match(es) changed, requesting widget refresh", changed);
            refresh.request(RefreshCause::ScoresUpdated);
            Ok(TickOutcome::Changed(changed))
        }
    }
}

/// Delay before retrying after a failed poll: double the current one, never
/// less than `base`, never more than [`MAX_BACKOFF`].
pub fn next_backoff(current: Duration, base: Duration) -> Duration {
    (current.max(base) * 2).min(MAX_BACKOFF)
}

/// Spawns a background task that polls today's matches at the configured
/// interval and requests a widget refresh whenever stored data changes.
///
/// Polls are skipped while the connectivity probe reports the network down.
/// When every provider fails, the next poll is delayed with exponential
/// backoff capped at five minutes.
pub fn start_score_sync(
    providers: Vec<Arc<dyn ScoreProvider>>,
    db: Database,
    probe: ConnectivityProbe,
    refresh: RefreshHandle,
    poll_interval: Duration,
) {
    tokio::spawn(async move {
        let provider_names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        info!(
            "Score sync started ({} providers: {:?}, interval={:?})",
            providers.len(),
            provider_names,
            poll_interval
        );

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut backoff = poll_interval;

        loop {
            interval.tick().await;

            let today = Local::now().date_naive();
            match poll_tick(&providers, &db, &probe, &refresh, today).await {
                Ok(_) => backoff = poll_interval,
                Err(e) => {
                    backoff = next_backoff(backoff, poll_interval);
                    warn!("Score sync failed: {:#}. Retrying in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    });
}
