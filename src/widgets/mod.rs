pub mod crests;

pub use crests::CrestCatalog;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::db::Database;
use crate::refresh::{
    Action, DisplayTarget, Navigator, PushError, RenderedView, Renderer, TargetRegistry,
};

/// Widget host backed by the SQLite `widgets` / `widget_views` tables.
///
/// Registered widgets are the display targets; a push replaces the stored
/// view for one widget, which clients then read through the dashboard API.
#[derive(Clone)]
pub struct WidgetHost {
    db: Database,
}

impl WidgetHost {
    pub fn new(db: Database) -> Self {
        WidgetHost { db }
    }
}

#[async_trait]
impl TargetRegistry for WidgetHost {
    async fn list_active(&self) -> Result<Vec<DisplayTarget>> {
        let widgets = self.db.list_widgets()?;
        Ok(widgets.into_iter().map(|w| DisplayTarget(w.id)).collect())
    }
}

#[async_trait]
impl Renderer for WidgetHost {
    async fn push(&self, target: DisplayTarget, view: &RenderedView) -> Result<(), PushError> {
        let json = serde_json::to_string(view).context("Failed to serialize widget view")?;
        if !self.db.store_view(target.0, &json)? {
            // Removed between enumeration and push
            return Err(PushError::UnknownTarget(target));
        }
        debug!("Pushed view for match {} to {}", view.match_id, target);
        Ok(())
    }
}

/// Navigation target for taps on the score: the main scores page.
#[derive(Debug, Clone)]
pub struct MainViewLink {
    url: String,
}

impl MainViewLink {
    pub fn new(url: impl Into<String>) -> Self {
        MainViewLink { url: url.into() }
    }
}

impl Navigator for MainViewLink {
    fn open_main_view(&self) -> Action {
        Action::OpenMainView {
            url: self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::MatchSnapshot;
    use crate::refresh::{build_view, Crests};

    fn view() -> RenderedView {
        let snap = MatchSnapshot {
            match_id: "42".into(),
            home_team: "Chelsea".into(),
            away_team: "Arsenal".into(),
            home_goals: 2,
            away_goals: 1,
        };
        build_view(
            &snap,
            &Crests::default(),
            MainViewLink::new("http://localhost:8080/").open_main_view(),
        )
    }

    #[tokio::test]
    async fn lists_registered_widgets_as_targets() {
        let db = Database::open_in_memory().unwrap();
        let a = db.register_widget("a").unwrap();
        let b = db.register_widget("b").unwrap();
        let host = WidgetHost::new(db);
        assert_eq!(
            host.list_active().await.unwrap(),
            vec![DisplayTarget(a), DisplayTarget(b)]
        );
    }

    #[tokio::test]
    async fn push_stores_the_full_view() {
        let db = Database::open_in_memory().unwrap();
        let id = db.register_widget("a").unwrap();
        let host = WidgetHost::new(db.clone());

        host.push(DisplayTarget(id), &view()).await.unwrap();

        let stored = db.get_view(id).unwrap().unwrap();
        let back: RenderedView = serde_json::from_value(stored.view).unwrap();
        assert_eq!(back, view());
    }

    #[tokio::test]
    async fn push_to_removed_widget_is_unknown_target() {
        let db = Database::open_in_memory().unwrap();
        let host = WidgetHost::new(db);
        let err = host.push(DisplayTarget(5), &view()).await.unwrap_err();
        assert!(matches!(err, PushError::UnknownTarget(DisplayTarget(5))));
    }
}
