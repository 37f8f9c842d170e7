use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;

use crate::db::Database;
use crate::refresh::{RefreshCause, RefreshHandle};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub refresh: RefreshHandle,
    /// Crest images published under /static/crests/
    pub crest_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct NewWidget {
    pub label: String,
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}

/// Build the Axum router for the widget API.
pub fn router(state: AppState) -> Router {
    let crests = ServeDir::new(&state.crest_dir);
    Router::new()
        .route("/", get(index_handler))
        .route("/api/widgets", get(list_widgets_handler).post(create_widget_handler))
        .route("/api/widgets/:id", axum::routing::delete(delete_widget_handler))
        .route("/api/widgets/:id/view", get(widget_view_handler))
        .route("/api/matches/today", get(matches_today_handler))
        .route("/api/refresh", post(refresh_handler))
        .nest_service("/static/crests", crests)
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn index_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

/// GET /api/widgets
async fn list_widgets_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.list_widgets().map(Json).map_err(internal)
}

/// POST /api/widgets  {"label": "..."}
async fn create_widget_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewWidget>,
) -> Result<impl IntoResponse, ApiError> {
    let label = body.label.trim();
    if label.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "label must not be empty".into()));
    }
    let id = state.db.register_widget(label).map_err(internal)?;
    info!("Widget {} registered ({})", id, label);
    // Paint the new widget straight away instead of waiting for the next change
    state.refresh.request(RefreshCause::ScoresUpdated);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": id, "label": label })),
    ))
}

/// DELETE /api/widgets/:id
async fn delete_widget_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.db.remove_widget(id).map_err(internal)? {
        info!("Widget {} removed", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("widget {} not found", id)))
    }
}

/// GET /api/widgets/:id/view
async fn widget_view_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.widget_exists(id).map_err(internal)? {
        return Err((StatusCode::NOT_FOUND, format!("widget {} not found", id)));
    }
    match state.db.get_view(id).map_err(internal)? {
        Some(view) => Ok(Json(view)),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("no view rendered for widget {}", id),
        )),
    }
}

/// GET /api/matches/today
async fn matches_today_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let today = Local::now().date_naive();
    state.db.list_matches_on(today).map(Json).map_err(internal)
}

/// POST /api/refresh
async fn refresh_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .refresh
        .run_now(RefreshCause::ScoresUpdated)
        .await
        .map(Json)
        .map_err(internal)
}

/// Embedded single-file widget preview (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Score Widgets</title>
<style>
  :root { --bg: #0f1117; --card: #1a1d27; --border: #2a2d3a; --accent: #6c63ff; --text: #e0e0e0; --muted: #8888aa; }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; }
  main { padding: 1.5rem 2rem; display: grid; grid-template-columns: repeat(auto-fill, minmax(260px, 1fr)); gap: 1rem; }
  .widget { background: var(--card); border: 1px solid var(--border); border-radius: 10px; padding: 1rem; }
  .label { color: var(--muted); font-size: .75rem; text-transform: uppercase; margin-bottom: .6rem; }
  .row { display: flex; align-items: center; justify-content: space-between; gap: .5rem; }
  .team { display: flex; flex-direction: column; align-items: center; width: 90px; font-size: .85rem; text-align: center; }
  .team img { width: 40px; height: 40px; object-fit: contain; margin-bottom: .3rem; }
  .score { font-size: 1.6rem; font-weight: 700; color: var(--text); text-decoration: none; }
  .empty { color: var(--muted); text-align: center; padding: 1rem; font-size: .9rem; }
  button { background: none; border: 1px solid var(--border); color: var(--muted); padding: .3rem .8rem; border-radius: 6px; cursor: pointer; }
  button:hover { border-color: var(--accent); color: var(--accent); }
</style>
</head>
<body>
<header>
  <h1>Score Widgets</h1>
  <button onclick="addWidget()">+ Widget</button>
  <button onclick="refreshNow()">Refresh</button>
  <span style="margin-left:auto;color:var(--muted);font-size:.8rem;" id="last-updated"></span>
</header>
<main id="widgets"><div class="empty">Loading…</div></main>
<script>
const esc = s => String(s ?? '').replace(/[&<>"']/g, c => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' })[c]);
const safeHref = u => /^https?:\/\//i.test(u ?? '') || String(u ?? '').startsWith('/') ? esc(u) : '#';
const crest = (ref, alt) => ref ? `<img src="${esc(ref)}" alt="${esc(alt)}">` : '';

async function renderWidget(w) {
  const r = await fetch(`/api/widgets/${w.id}/view`);
  if (!r.ok) return `<div class="widget"><div class="label">${esc(w.label)}</div><div class="empty">No match today</div></div>`;
  const v = (await r.json()).view;
  return `<div class="widget">
    <div class="label">${esc(w.label)}</div>
    <div class="row">
      <div class="team">${crest(v.home_crest, v.home_crest_description)}${esc(v.home_name)}</div>
      <a class="score" href="${safeHref(v.on_score_click?.url)}">${esc(v.score_text)}</a>
      <div class="team">${crest(v.away_crest, v.away_crest_description)}${esc(v.away_name)}</div>
    </div>
  </div>`;
}

async function loadAll() {
  const r = await fetch('/api/widgets');
  if (!r.ok) return;
  const widgets = await r.json();
  const el = document.getElementById('widgets');
  if (!widgets.length) { el.innerHTML = '<div class="empty">No widgets registered</div>'; return; }
  el.innerHTML = (await Promise.all(widgets.map(renderWidget))).join('');
  document.getElementById('last-updated').textContent = 'Updated ' + new Date().toLocaleTimeString();
}

async function addWidget() {
  const label = prompt('Widget label');
  if (!label) return;
  await fetch('/api/widgets', { method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify({ label }) });
  setTimeout(loadAll, 300);
}

async function refreshNow() {
  await fetch('/api/refresh', { method: 'POST' });
  loadAll();
}

loadAll();
setInterval(loadAll, 10000);
</script>
</body>
</html>"#;
