use serde::{Deserialize, Serialize};

use crate::db::models::MatchSnapshot;

/// Reference to a crest image the host can load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(pub String);

/// Something the host performs when the user interacts with a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    OpenMainView { url: String },
}

/// Everything one display target needs for a single push.
///
/// Always built in full before it is handed to a renderer, so a target sees
/// either the whole view or none of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedView {
    pub match_id: String,
    pub home_name: String,
    pub away_name: String,
    pub score_text: String,
    pub home_crest: Option<ImageRef>,
    pub away_crest: Option<ImageRef>,
    /// Accessibility text for the crest images
    pub home_crest_description: String,
    pub away_crest_description: String,
    pub on_score_click: Action,
}

/// Crest references resolved once per cycle.
#[derive(Debug, Clone, Default)]
pub struct Crests {
    pub home: Option<ImageRef>,
    pub away: Option<ImageRef>,
}

/// "2 - 1", or " - " when either side has no goal count yet.
pub fn format_score(home_goals: i32, away_goals: i32) -> String {
    if home_goals < 0 || away_goals < 0 {
        " - ".to_string()
    } else {
        format!("{} - {}", home_goals, away_goals)
    }
}

pub fn build_view(snapshot: &MatchSnapshot, crests: &Crests, action: Action) -> RenderedView {
    RenderedView {
        match_id: snapshot.match_id.clone(),
        home_name: snapshot.home_team.clone(),
        away_name: snapshot.away_team.clone(),
        score_text: format_score(snapshot.home_goals, snapshot.away_goals),
        home_crest: crests.home.clone(),
        away_crest: crests.away.clone(),
        home_crest_description: snapshot.home_team.clone(),
        away_crest_description: snapshot.away_team.clone(),
        on_score_click: action,
    }
}
