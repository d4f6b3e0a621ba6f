//! HTTP endpoint handlers. These are thin wrappers that forward to the game
//! controller; failures render through `AppError`'s JSON body.

use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::{Query, State},
  http::header,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::controller::{CompleteOutcome, ShareOutcome, SubmitOutcome};
use crate::domain::{Achievement, LeaderboardEntry, SkillLevel};
use crate::error::AppError;
use crate::profile::GamePreferences;
use crate::protocol::*;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, AppError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

// ---- profile & onboarding ----

#[instrument(level = "info", skip(state))]
pub async fn http_get_profile(State(state): State<Arc<AppState>>) -> ApiResult<ProfileOut> {
  Ok(Json(state.controller.profile().await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_onboarding(State(state): State<Arc<AppState>>) -> ApiResult<OnboardingStatusOut> {
  let completed = state.controller.onboarding_status().await?;
  Ok(Json(OnboardingStatusOut { completed }))
}

#[instrument(level = "info", skip(state, body), fields(skill = ?body.skill_level))]
pub async fn http_post_onboarding(State(state): State<Arc<AppState>>, Json(body): Json<OnboardingIn>) -> ApiResult<ProfileOut> {
  let profile = state.controller.complete_onboarding(body).await?;
  info!(target: "sportpulse_backend", username = %profile.username, "HTTP onboarding completed");
  Ok(Json(profile.into()))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_put_username(State(state): State<Arc<AppState>>, Json(body): Json<UsernameIn>) -> ApiResult<ProfileOut> {
  Ok(Json(state.controller.update_username(body.username).await?.into()))
}

#[instrument(level = "info", skip(state), fields(skill = ?body.skill_level))]
pub async fn http_put_skill(State(state): State<Arc<AppState>>, Json(body): Json<SkillIn>) -> ApiResult<ProfileOut> {
  Ok(Json(state.controller.update_skill_level(body.skill_level).await?.into()))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_put_preferences(State(state): State<Arc<AppState>>, Json(body): Json<GamePreferences>) -> ApiResult<ProfileOut> {
  Ok(Json(state.controller.update_preferences(body).await?.into()))
}

// ---- catalog & session ----

#[instrument(level = "info")]
pub async fn http_get_skill_levels() -> impl IntoResponse {
  Json(SkillLevel::ALL.into_iter().map(SkillLevelOut::from).collect::<Vec<_>>())
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_challenges(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ChallengeOut>> {
  let challenges = state.controller.challenges().await?;
  Ok(Json(challenges.into_iter().map(ChallengeOut::from).collect()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>) -> ApiResult<SessionOut> {
  Ok(Json(state.controller.session().await?.into()))
}

#[instrument(level = "info", skip(state), fields(challenge_type = ?body.challenge_type))]
pub async fn http_post_start(State(state): State<Arc<AppState>>, Json(body): Json<StartIn>) -> ApiResult<SessionOut> {
  let session = state.controller.start_challenge(body.challenge_type).await?;
  info!(target: "session", challenge_type = ?body.challenge_type, time_remaining = session.time_remaining, "HTTP challenge started");
  Ok(Json(session.into()))
}

#[instrument(level = "info", skip(state), fields(score = body.score))]
pub async fn http_post_complete(State(state): State<Arc<AppState>>, Json(body): Json<CompleteIn>) -> ApiResult<CompleteOutcome> {
  let outcome = state.controller.complete_challenge(body.score).await?;
  info!(target: "session", score = body.score, final_score = ?outcome.final_score, "HTTP challenge completed");
  Ok(Json(outcome))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_pause(State(state): State<Arc<AppState>>) -> ApiResult<SessionOut> {
  Ok(Json(state.controller.pause().await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_resume(State(state): State<Arc<AppState>>) -> ApiResult<SessionOut> {
  Ok(Json(state.controller.resume().await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_end(State(state): State<Arc<AppState>>) -> ApiResult<GameOverOut> {
  Ok(Json(state.controller.end_session().await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_menu(State(state): State<Arc<AppState>>) -> ApiResult<SessionOut> {
  Ok(Json(state.controller.new_session().await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_achievements(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Achievement>> {
  Ok(Json(state.controller.achievements().await?))
}

// ---- leaderboard & social ----

#[instrument(level = "info", skip(state))]
pub async fn http_get_leaderboard(State(state): State<Arc<AppState>>, Query(q): Query<LeaderboardQuery>) -> ApiResult<Vec<LeaderboardEntry>> {
  let limit = super::leaderboard_limit(q.limit);
  Ok(Json(state.controller.leaderboard(limit).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_submit(State(state): State<Arc<AppState>>) -> ApiResult<SubmitOutcome> {
  Ok(Json(state.controller.submit_score().await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_connectivity(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ConnectivityOut { online: state.controller.is_online() })
}

#[instrument(level = "info", skip(state), fields(online = body.online))]
pub async fn http_put_connectivity(State(state): State<Arc<AppState>>, Json(body): Json<ConnectivityIn>) -> impl IntoResponse {
  state.controller.set_online(body.online);
  Json(ConnectivityOut { online: state.controller.is_online() })
}

#[instrument(level = "info", skip(state), fields(score = body.score))]
pub async fn http_post_share_score(State(state): State<Arc<AppState>>, Json(body): Json<ShareScoreIn>) -> ApiResult<ShareOutcome> {
  Ok(Json(state.controller.share_score(body.score, body.challenge_type).await?))
}

#[instrument(level = "info", skip(state), fields(title = %body.title))]
pub async fn http_post_share_achievement(State(state): State<Arc<AppState>>, Json(body): Json<ShareAchievementIn>) -> ApiResult<ShareOutcome> {
  Ok(Json(state.controller.share_achievement(body.title).await?))
}

// ---- history & data management ----

#[instrument(level = "info", skip(state))]
pub async fn http_get_history(State(state): State<Arc<AppState>>) -> ApiResult<HistoryOut> {
  Ok(Json(HistoryOut { entries: state.controller.history().await? }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_data_size(State(state): State<Arc<AppState>>) -> ApiResult<DataSizeOut> {
  Ok(Json(DataSizeOut { bytes: state.controller.data_size().await? }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_export(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
  let blob = state.controller.export().await?;
  Ok(([(header::CONTENT_TYPE, "application/json")], blob))
}

#[instrument(level = "info", skip(state, body), fields(bytes = body.len()))]
pub async fn http_post_import(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<ProfileOut> {
  Ok(Json(state.controller.import(body.to_vec()).await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_backup(State(state): State<Arc<AppState>>) -> ApiResult<OkOut> {
  state.controller.backup().await?;
  Ok(Json(OkOut { ok: true }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_restore(State(state): State<Arc<AppState>>) -> ApiResult<ProfileOut> {
  Ok(Json(state.controller.restore().await?.into()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset(State(state): State<Arc<AppState>>) -> ApiResult<OkOut> {
  state.controller.reset().await?;
  Ok(Json(OkOut { ok: true }))
}
