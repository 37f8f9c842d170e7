//! The widget refresh cycle.
//!
//! One cycle loads today's match snapshot and paints it onto every active
//! display target. Cycles carry no state between runs: a second run over an
//! unchanged snapshot produces the same views, and pushes are last-write-wins
//! per target, so repeated or overlapping triggers are harmless.
//!
//! The cycle only talks to its collaborators through the traits below. The
//! SQLite store, widget host, crest catalog and main-view link in this crate
//! are the production implementations.

pub mod view;
pub mod worker;

pub use view::{build_view, format_score, Action, Crests, ImageRef, RenderedView};
pub use worker::{RefreshHandle, RefreshWorker};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::models::MatchSnapshot;

/// Opaque handle to one rendering surface (a registered widget).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayTarget(pub i64);

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget#{}", self.0)
    }
}

/// Why a refresh was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshCause {
    /// Score data changed (or a host wants the widgets repainted).
    ScoresUpdated,
    /// Anything else a host forwards; cycles ignore these.
    Other(String),
}

impl fmt::Display for RefreshCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshCause::ScoresUpdated => write!(f, "scores_updated"),
            RefreshCause::Other(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("{0} is not registered")]
    UnknownTarget(DisplayTarget),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("failed to enumerate display targets: {0:#}")]
    Enumeration(anyhow::Error),
    /// The cycle task panicked or was cancelled before finishing.
    #[error("refresh cycle aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPush {
    pub target: DisplayTarget,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The cause wasn't a refresh request.
    Ignored,
    /// No usable snapshot for today; no target was touched.
    NothingToRender,
    Refreshed {
        updated: Vec<DisplayTarget>,
        failed: Vec<FailedPush>,
    },
}

impl RefreshOutcome {
    /// At least one target kept its previous view because its push failed.
    pub fn is_partial(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { failed, .. } if !failed.is_empty())
    }
}

// ── Collaborators ─────────────────────────────────────────────────────────────

/// Answers "what is the match for this day".
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn query_today(&self, date: NaiveDate) -> Result<Option<MatchSnapshot>>;
}

/// Enumerates the currently live display targets.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    async fn list_active(&self) -> Result<Vec<DisplayTarget>>;
}

/// Applies a rendered view to one target.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn push(&self, target: DisplayTarget, view: &RenderedView) -> Result<(), PushError>;
}

/// Best-effort crest image resolution.
pub trait CrestLookup: Send + Sync {
    fn resolve(&self, team_name: &str) -> Option<ImageRef>;
}

pub trait Navigator: Send + Sync {
    fn open_main_view(&self) -> Action;
}

// ── Cycle ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RefreshCycle {
    store: Arc<dyn SnapshotStore>,
    registry: Arc<dyn TargetRegistry>,
    renderer: Arc<dyn Renderer>,
    crests: Arc<dyn CrestLookup>,
    navigator: Arc<dyn Navigator>,
}

impl RefreshCycle {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        registry: Arc<dyn TargetRegistry>,
        renderer: Arc<dyn Renderer>,
        crests: Arc<dyn CrestLookup>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        RefreshCycle {
            store,
            registry,
            renderer,
            crests,
            navigator,
        }
    }

    /// Run one cycle keyed by the local date at the moment of the call.
    pub async fn run(&self, cause: RefreshCause) -> Result<RefreshOutcome, RefreshError> {
        let today = Local::now().date_naive();
        self.run_for_date(cause, today).await
    }

    /// Run one cycle for an explicit date. The whole cycle uses this one key.
    pub async fn run_for_date(
        &self,
        cause: RefreshCause,
        today: NaiveDate,
    ) -> Result<RefreshOutcome, RefreshError> {
        if cause != RefreshCause::ScoresUpdated {
            debug!("Ignoring refresh trigger '{}'", cause);
            return Ok(RefreshOutcome::Ignored);
        }

        let snapshot = match self.store.query_today(today).await {
            Ok(Some(s)) if !s.is_garbage() => s,
            Ok(Some(s)) => {
                warn!("Discarding unusable snapshot for {}: {:?}", today, s);
                return Ok(RefreshOutcome::NothingToRender);
            }
            Ok(None) => {
                debug!("No match stored for {}, widgets left as they are", today);
                return Ok(RefreshOutcome::NothingToRender);
            }
            Err(e) => {
                warn!("Snapshot query for {} failed: {:#}", today, e);
                return Ok(RefreshOutcome::NothingToRender);
            }
        };

        let targets = self
            .registry
            .list_active()
            .await
            .map_err(RefreshError::Enumeration)?;

        // Crests depend only on the snapshot, so look them up once.
        let crests = Crests {
            home: self.resolve_crest(&snapshot.home_team),
            away: self.resolve_crest(&snapshot.away_team),
        };

        let renderer = &self.renderer;
        let pushes = targets.iter().map(|&target| {
            let view = build_view(&snapshot, &crests, self.navigator.open_main_view());
            async move { (target, renderer.push(target, &view).await) }
        });

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for (target, result) in join_all(pushes).await {
            match result {
                Ok(()) => updated.push(target),
                Err(e) => {
                    warn!("Push to {} failed: {}", target, e);
                    failed.push(FailedPush {
                        target,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Refreshed {} of {} widget(s) with {} {} {}",
            updated.len(),
            targets.len(),
            snapshot.home_team,
            format_score(snapshot.home_goals, snapshot.away_goals),
            snapshot.away_team
        );

        Ok(RefreshOutcome::Refreshed { updated, failed })
    }

    fn resolve_crest(&self, team: &str) -> Option<ImageRef> {
        let crest = self.crests.resolve(team);
        if crest.is_none() {
            debug!("No crest for '{}'", team);
        }
        crest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeStore {
        snapshot: Option<MatchSnapshot>,
        fail: bool,
        calls: AtomicUsize,
        dates: Mutex<Vec<NaiveDate>>,
    }

    impl FakeStore {
        fn with(snapshot: Option<MatchSnapshot>) -> Arc<Self> {
            Arc::new(FakeStore {
                snapshot,
                fail: false,
                calls: AtomicUsize::new(0),
                dates: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SnapshotStore for FakeStore {
        async fn query_today(&self, date: NaiveDate) -> Result<Option<MatchSnapshot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.dates.lock().unwrap().push(date);
            if self.fail {
                anyhow::bail!("store offline");
            }
            Ok(self.snapshot.clone())
        }
    }

    struct FakeRegistry {
        targets: Vec<DisplayTarget>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeRegistry {
        fn with(ids: &[i64]) -> Arc<Self> {
            Arc::new(FakeRegistry {
                targets: ids.iter().map(|&id| DisplayTarget(id)).collect(),
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TargetRegistry for FakeRegistry {
        async fn list_active(&self) -> Result<Vec<DisplayTarget>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("registry unavailable");
            }
            Ok(self.targets.clone())
        }
    }

    #[derive(Default)]
    struct FakeRenderer {
        failing: HashSet<DisplayTarget>,
        views: Mutex<HashMap<DisplayTarget, RenderedView>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn push(&self, target: DisplayTarget, view: &RenderedView) -> Result<(), PushError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&target) {
                return Err(PushError::UnknownTarget(target));
            }
            self.views.lock().unwrap().insert(target, view.clone());
            Ok(())
        }
    }

    /// Knows every crest except Chelsea's.
    struct FakeCrests;

    impl CrestLookup for FakeCrests {
        fn resolve(&self, team_name: &str) -> Option<ImageRef> {
            if team_name == "Chelsea" {
                None
            } else {
                Some(ImageRef(format!("crest://{}", team_name.to_lowercase())))
            }
        }
    }

    struct FakeNav;

    impl Navigator for FakeNav {
        fn open_main_view(&self) -> Action {
            Action::OpenMainView {
                url: "app://main".into(),
            }
        }
    }

    fn chelsea_arsenal() -> MatchSnapshot {
        MatchSnapshot {
            match_id: "42".into(),
            home_team: "Chelsea".into(),
            away_team: "Arsenal".into(),
            home_goals: 2,
            away_goals: 1,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn cycle(
        store: Arc<FakeStore>,
        registry: Arc<FakeRegistry>,
        renderer: Arc<FakeRenderer>,
    ) -> RefreshCycle {
        RefreshCycle::new(store, registry, renderer, Arc::new(FakeCrests), Arc::new(FakeNav))
    }

    #[tokio::test]
    async fn chelsea_arsenal_reaches_both_widgets_without_home_crest() {
        let renderer = Arc::new(FakeRenderer::default());
        let c = cycle(
            FakeStore::with(Some(chelsea_arsenal())),
            FakeRegistry::with(&[1, 2]),
            renderer.clone(),
        );

        let outcome = c
            .run_for_date(RefreshCause::ScoresUpdated, today())
            .await
            .unwrap();

        match &outcome {
            RefreshOutcome::Refreshed { updated, failed } => {
                assert_eq!(updated.len(), 2);
                assert!(failed.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let views = renderer.views.lock().unwrap();
        for id in [1, 2] {
            let v = &views[&DisplayTarget(id)];
            assert_eq!(v.score_text, "2 - 1");
            assert_eq!(v.home_name, "Chelsea");
            assert_eq!(v.away_name, "Arsenal");
            assert!(v.home_crest.is_none());
            assert_eq!(v.away_crest, Some(ImageRef("crest://arsenal".into())));
            assert_eq!(
                v.on_score_click,
                Action::OpenMainView {
                    url: "app://main".into()
                }
            );
        }
    }

    #[tokio::test]
    async fn missing_snapshot_touches_nothing() {
        let registry = FakeRegistry::with(&[1, 2]);
        let renderer = Arc::new(FakeRenderer::default());
        let c = cycle(FakeStore::with(None), registry.clone(), renderer.clone());

        let outcome = c
            .run_for_date(RefreshCause::ScoresUpdated, today())
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::NothingToRender);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn garbage_snapshot_or_store_error_is_nothing_to_render() {
        let mut garbage = chelsea_arsenal();
        garbage.home_team = "  ".into();
        let renderer = Arc::new(FakeRenderer::default());
        let c = cycle(
            FakeStore::with(Some(garbage)),
            FakeRegistry::with(&[1]),
            renderer.clone(),
        );
        assert_eq!(
            c.run_for_date(RefreshCause::ScoresUpdated, today()).await.unwrap(),
            RefreshOutcome::NothingToRender
        );

        let failing_store = Arc::new(FakeStore {
            snapshot: Some(chelsea_arsenal()),
            fail: true,
            calls: AtomicUsize::new(0),
            dates: Mutex::new(Vec::new()),
        });
        let c = cycle(failing_store, FakeRegistry::with(&[1]), renderer.clone());
        assert_eq!(
            c.run_for_date(RefreshCause::ScoresUpdated, today()).await.unwrap(),
            RefreshOutcome::NothingToRender
        );
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unrecognized_cause_is_a_noop() {
        let store = FakeStore::with(Some(chelsea_arsenal()));
        let registry = FakeRegistry::with(&[1]);
        let renderer = Arc::new(FakeRenderer::default());
        let c = cycle(store.clone(), registry.clone(), renderer.clone());

        let outcome = c
            .run_for_date(RefreshCause::Other("widget_disabled".into()), today())
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Ignored);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_push_does_not_block_other_targets() {
        let renderer = Arc::new(FakeRenderer {
            failing: [DisplayTarget(1)].into_iter().collect(),
            ..Default::default()
        });
        let c = cycle(
            FakeStore::with(Some(chelsea_arsenal())),
            FakeRegistry::with(&[1, 2]),
            renderer.clone(),
        );

        let outcome = c
            .run_for_date(RefreshCause::ScoresUpdated, today())
            .await
            .unwrap();

        assert!(outcome.is_partial());
        match outcome {
            RefreshOutcome::Refreshed { updated, failed } => {
                assert_eq!(updated, vec![DisplayTarget(2)]);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].target, DisplayTarget(1));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let views = renderer.views.lock().unwrap();
        assert!(!views.contains_key(&DisplayTarget(1)));
        assert_eq!(views[&DisplayTarget(2)].score_text, "2 - 1");
    }

    #[tokio::test]
    async fn enumeration_failure_fails_the_cycle() {
        let registry = Arc::new(FakeRegistry {
            targets: vec![DisplayTarget(1)],
            fail: true,
            calls: AtomicUsize::new(0),
        });
        let renderer = Arc::new(FakeRenderer::default());
        let c = cycle(
            FakeStore::with(Some(chelsea_arsenal())),
            registry,
            renderer.clone(),
        );

        let err = c
            .run_for_date(RefreshCause::ScoresUpdated, today())
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Enumeration(_)));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_runs_render_identical_views() {
        let renderer = Arc::new(FakeRenderer::default());
        let c = cycle(
            FakeStore::with(Some(chelsea_arsenal())),
            FakeRegistry::with(&[7]),
            renderer.clone(),
        );

        c.run_for_date(RefreshCause::ScoresUpdated, today()).await.unwrap();
        let first = renderer.views.lock().unwrap()[&DisplayTarget(7)].clone();
        c.run_for_date(RefreshCause::ScoresUpdated, today()).await.unwrap();
        let second = renderer.views.lock().unwrap()[&DisplayTarget(7)].clone();

        assert_eq!(first, second);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn every_view_matches_one_snapshot() {
        let renderer = Arc::new(FakeRenderer::default());
        let snap = chelsea_arsenal();
        let c = cycle(
            FakeStore::with(Some(snap.clone())),
            FakeRegistry::with(&[1, 2, 3, 4]),
            renderer.clone(),
        );
        c.run_for_date(RefreshCause::ScoresUpdated, today()).await.unwrap();

        for v in renderer.views.lock().unwrap().values() {
            assert_eq!(v.match_id, snap.match_id);
            assert_eq!(
                (v.home_name.as_str(), v.away_name.as_str(), v.score_text.as_str()),
                ("Chelsea", "Arsenal", "2 - 1")
            );
        }
    }

    #[tokio::test]
    async fn cycle_queries_store_with_its_date_once() {
        let store = FakeStore::with(Some(chelsea_arsenal()));
        let c = cycle(
            store.clone(),
            FakeRegistry::with(&[]),
            Arc::new(FakeRenderer::default()),
        );
        let outcome = c
            .run_for_date(RefreshCause::ScoresUpdated, today())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                updated: vec![],
                failed: vec![]
            }
        );
        assert_eq!(*store.dates.lock().unwrap(), vec![today()]);
    }
}
