//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  routing::{get, post, put},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Default and maximum rows for leaderboard queries.
const LEADERBOARD_DEFAULT: usize = 10;
const LEADERBOARD_MAX: usize = 100;

/// Row count for a leaderboard query, shared by HTTP and WebSocket.
pub fn leaderboard_limit(requested: Option<usize>) -> usize {
  requested.unwrap_or(LEADERBOARD_DEFAULT).clamp(1, LEADERBOARD_MAX)
}

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static frontend from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  let static_service = ServeDir::new("./static")
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new("./static/index.html"));

  Router::new()
    .route("/ws", get(ws::ws_upgrade))
    .route("/api/v1/health", get(http::http_health))
    // profile & onboarding
    .route("/api/v1/profile", get(http::http_get_profile))
    .route("/api/v1/onboarding", get(http::http_get_onboarding).post(http::http_post_onboarding))
    .route("/api/v1/profile/username", put(http::http_put_username))
    .route("/api/v1/profile/skill", put(http::http_put_skill))
    .route("/api/v1/profile/preferences", put(http::http_put_preferences))
    // catalog & session
    .route("/api/v1/skill-levels", get(http::http_get_skill_levels))
    .route("/api/v1/challenges", get(http::http_get_challenges))
    .route("/api/v1/session", get(http::http_get_session))
    .route("/api/v1/session/start", post(http::http_post_start))
    .route("/api/v1/session/complete", post(http::http_post_complete))
    .route("/api/v1/session/pause", post(http::http_post_pause))
    .route("/api/v1/session/resume", post(http::http_post_resume))
    .route("/api/v1/session/end", post(http::http_post_end))
    .route("/api/v1/session/menu", post(http::http_post_menu))
    .route("/api/v1/achievements", get(http::http_get_achievements))
    // leaderboard & social
    .route("/api/v1/leaderboard", get(http::http_get_leaderboard))
    .route("/api/v1/leaderboard/submit", post(http::http_post_submit))
    .route("/api/v1/connectivity", get(http::http_get_connectivity).put(http::http_put_connectivity))
    .route("/api/v1/share/score", post(http::http_post_share_score))
    .route("/api/v1/share/achievement", post(http::http_post_share_achievement))
    // history & data management
    .route("/api/v1/history", get(http::http_get_history))
    .route("/api/v1/data/size", get(http::http_get_data_size))
    .route("/api/v1/data/export", get(http::http_get_export))
    .route("/api/v1/data/import", post(http::http_post_import))
    .route("/api/v1/data/backup", post(http::http_post_backup))
    .route("/api/v1/data/restore", post(http::http_post_restore))
    .route("/api/v1/data/reset", post(http::http_post_reset))
    // State + CORS + HTTP tracing
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use http_body_util::BodyExt;
  use serde_json::Value;
  use tower::ServiceExt;

  use crate::config::GameConfig;
  use crate::leaderboard::{LeaderboardGateway, MockLeaderboard};
  use crate::persistence::{JsonFileStore, PersistenceGateway};

  async fn app(dir: &std::path::Path) -> Router {
    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(dir));
    let leaderboard: Arc<dyn LeaderboardGateway> = Arc::new(MockLeaderboard::new(Duration::ZERO, "https://example.test/share", true));
    let (state, _task) = AppState::with_gateways(GameConfig::default(), store, leaderboard).await;
    build_router(Arc::new(state))
  }

  async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(json) => {
        req = req.header("content-type", "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
  }

  #[test]
  fn leaderboard_limit_is_clamped() {
    assert_eq!(leaderboard_limit(None), 10);
    assert_eq!(leaderboard_limit(Some(0)), 1);
    assert_eq!(leaderboard_limit(Some(25)), 25);
    assert_eq!(leaderboard_limit(Some(5000)), 100);
  }

  #[tokio::test]
  async fn health() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;
    let (status, json) = call(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
  }

  #[tokio::test]
  async fn onboarding_then_a_full_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (_, json) = call(&app, "GET", "/api/v1/onboarding", None).await;
    assert_eq!(json["completed"], false);

    let (status, json) = call(&app, "POST", "/api/v1/onboarding", Some(serde_json::json!({ "username": "ab" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "validation");
    assert_eq!(json["code"], 400);

    let (status, json) = call(
      &app,
      "POST",
      "/api/v1/onboarding",
      Some(serde_json::json!({ "username": "Sprinter", "skillLevel": "expert", "notificationsGranted": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "Sprinter");
    let (_, json) = call(&app, "GET", "/api/v1/onboarding", None).await;
    assert_eq!(json["completed"], true);

    let (_, json) = call(&app, "GET", "/api/v1/skill-levels", None).await;
    assert_eq!(json[3]["level"], "expert");
    assert_eq!(json[3]["difficultyMultiplier"], 2.0);

    let (_, json) = call(&app, "GET", "/api/v1/challenges", None).await;
    assert_eq!(json.as_array().unwrap().len(), 5);
    assert_eq!(json[0]["difficulty"], 10);
    assert_eq!(json[0]["timeLimit"], 60.0);

    let (status, json) = call(&app, "POST", "/api/v1/session/start", Some(serde_json::json!({ "challengeType": "memory" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "playing");
    assert_eq!(json["formattedTime"], "01:00");

    let (status, json) = call(&app, "POST", "/api/v1/session/start", Some(serde_json::json!({ "challengeType": "timing" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "invalid_transition");

    let (_, json) = call(&app, "POST", "/api/v1/session/complete", Some(serde_json::json!({ "score": 25 }))).await;
    assert!(json["finalScore"].as_u64().unwrap() >= 120 * 10 + 25);
    assert_eq!(json["session"]["state"], "menu");

    let (status, json) = call(&app, "POST", "/api/v1/session/end", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["profile"]["stats"]["gamesPlayed"], 1);
    let titles: Vec<&str> = json["unlocked"].as_array().unwrap().iter().filter_map(|a| a["title"].as_str()).collect();
    assert!(titles.contains(&"Memory Master"));
    assert!(titles.contains(&"Score Master"));

    let (_, json) = call(&app, "GET", "/api/v1/achievements", None).await;
    assert!(json.as_array().unwrap().len() >= 2);

    let (status, json) = call(&app, "POST", "/api/v1/session/menu", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sessionScore"], 0);
  }

  #[tokio::test]
  async fn offline_leaderboard_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (_, json) = call(&app, "GET", "/api/v1/leaderboard?limit=3", None).await;
    assert_eq!(json.as_array().unwrap().len(), 3);
    assert_eq!(json[0]["rank"], 1);

    let (_, json) = call(&app, "PUT", "/api/v1/connectivity", Some(serde_json::json!({ "online": false }))).await;
    assert_eq!(json["online"], false);

    let (status, json) = call(&app, "GET", "/api/v1/leaderboard", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "connectivity");
    assert_eq!(json["message"], "No internet connection available");
  }

  #[tokio::test]
  async fn data_management() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, json) = call(&app, "POST", "/api/v1/data/restore", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "No backup file found");

    let (status, _) = call(&app, "PUT", "/api/v1/profile/username", Some(serde_json::json!({ "username": "Archivist" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "POST", "/api/v1/data/backup", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, exported) = call(&app, "GET", "/api/v1/data/export", None).await;
    assert_eq!(exported["userProfile"]["username"], "Archivist");
    assert_eq!(exported["version"], "1.0");

    let (status, _) = call(&app, "POST", "/api/v1/data/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, json) = call(&app, "GET", "/api/v1/profile", None).await;
    assert_eq!(json["username"], "");

    let (status, json) = call(&app, "POST", "/api/v1/data/import", Some(exported)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "Archivist");
  }
}
