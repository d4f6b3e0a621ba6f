//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the controller with a single JSON reply. Controller events
//! (ticks, completions, unlocks, notices) are streamed in between.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};

use super::leaderboard_limit;
use crate::controller::GameController;
use crate::domain::SkillLevel;
use crate::error::AppError;
use crate::profile::{OnboardingRequest, UserProfile};
use crate::protocol::{ChallengeOut, ClientWsMessage, ServerWsMessage, SkillLevelOut};
use crate::session::GameSession;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "sportpulse_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "sportpulse_backend", error = %e, "WS send error");
      false
    }
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "sportpulse_backend", "WebSocket connected");
  let mut events = state.controller.subscribe();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "sportpulse_backend", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state.controller).await
              }
              Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
            };
            if !send(&mut socket, &reply).await {
              break;
            }
          }
          Message::Ping(payload) => {
            let _ = socket.send(Message::Pong(payload)).await;
          }
          Message::Close(_) => break,
          _ => {}
        }
      }
      event = events.recv() => match event {
        Ok(event) => {
          if !send(&mut socket, &ServerWsMessage::Event { event }).await {
            break;
          }
        }
        Err(RecvError::Lagged(skipped)) => {
          warn!(target: "sportpulse_backend", skipped, "WS client lagging; events dropped");
        }
        Err(RecvError::Closed) => break,
      },
    }
  }
  info!(target: "sportpulse_backend", "WebSocket disconnected");
}

fn reply<T>(result: Result<T, AppError>, ok: impl FnOnce(T) -> ServerWsMessage) -> ServerWsMessage {
  match result {
    Ok(value) => ok(value),
    Err(e) => ServerWsMessage::Error { message: e.to_string() },
  }
}

#[instrument(level = "info", skip(controller))]
async fn handle_client_ws(msg: ClientWsMessage, controller: &GameController) -> ServerWsMessage {
  let profile = |p: UserProfile| ServerWsMessage::Profile { profile: p.into() };
  let session = |s: GameSession| ServerWsMessage::Session { session: s.into() };

  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,
    ClientWsMessage::GetProfile => reply(controller.profile().await, profile),
    ClientWsMessage::GetOnboarding => {
      reply(controller.onboarding_status().await, |completed| ServerWsMessage::Onboarding { completed })
    }
    ClientWsMessage::CompleteOnboarding { username, avatar, skill_level, notifications_granted } => {
      let request = OnboardingRequest { username, avatar, skill_level, notifications_granted };
      reply(controller.complete_onboarding(request).await, profile)
    }
    ClientWsMessage::UpdateUsername { username } => reply(controller.update_username(username).await, profile),
    ClientWsMessage::UpdateSkillLevel { skill_level } => reply(controller.update_skill_level(skill_level).await, profile),
    ClientWsMessage::UpdatePreferences { preferences } => reply(controller.update_preferences(preferences).await, profile),
    ClientWsMessage::GetSkillLevels => ServerWsMessage::SkillLevels { levels: SkillLevel::ALL.into_iter().map(SkillLevelOut::from).collect() },
    ClientWsMessage::GetChallenges => reply(controller.challenges().await, |c| ServerWsMessage::Challenges {
      challenges: c.into_iter().map(ChallengeOut::from).collect(),
    }),
    ClientWsMessage::GetAchievements => {
      reply(controller.achievements().await, |achievements| ServerWsMessage::Achievements { achievements })
    }
    ClientWsMessage::GetSession => reply(controller.session().await, session),
    ClientWsMessage::StartChallenge { challenge_type } => reply(controller.start_challenge(challenge_type).await, session),
    ClientWsMessage::CompleteChallenge { score } => {
      reply(controller.complete_challenge(score).await, |outcome| ServerWsMessage::ChallengeResult { outcome })
    }
    ClientWsMessage::Pause => reply(controller.pause().await, session),
    ClientWsMessage::Resume => reply(controller.resume().await, session),
    ClientWsMessage::EndSession => {
      reply(controller.end_session().await, |r| ServerWsMessage::GameOverReport { report: r.into() })
    }
    ClientWsMessage::ReturnToMenu => reply(controller.new_session().await, session),
    ClientWsMessage::SubmitScore => reply(controller.submit_score().await, |outcome| ServerWsMessage::Submitted { outcome }),
    ClientWsMessage::Leaderboard { limit } => {
      reply(controller.leaderboard(leaderboard_limit(limit)).await, |entries| ServerWsMessage::Leaderboard { entries })
    }
    ClientWsMessage::ShareScore { score, challenge_type } => {
      reply(controller.share_score(score, challenge_type).await, |outcome| ServerWsMessage::Shared { outcome })
    }
    ClientWsMessage::ShareAchievement { title } => {
      reply(controller.share_achievement(title).await, |outcome| ServerWsMessage::Shared { outcome })
    }
    ClientWsMessage::GetConnectivity => ServerWsMessage::Connectivity { online: controller.is_online() },
    ClientWsMessage::SetConnectivity { online } => {
      controller.set_online(online);
      ServerWsMessage::Connectivity { online: controller.is_online() }
    }
    ClientWsMessage::GetHistory => reply(controller.history().await, |entries| ServerWsMessage::History { entries }),
    ClientWsMessage::GetDataSize => reply(controller.data_size().await, |bytes| ServerWsMessage::DataSize { bytes }),
    ClientWsMessage::ExportData => match controller.export().await {
      Ok(blob) => match serde_json::from_slice(&blob) {
        Ok(data) => ServerWsMessage::Exported { data },
        Err(e) => ServerWsMessage::Error { message: format!("Stored data is not valid JSON: {}", e) },
      },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
    ClientWsMessage::ImportData { data } => match serde_json::to_vec(&data) {
      Ok(blob) => reply(controller.import(blob).await, profile),
      Err(e) => ServerWsMessage::Error { message: format!("Serialization error: {}", e) },
    },
    ClientWsMessage::BackupData => reply(controller.backup().await, |()| ServerWsMessage::Done),
    ClientWsMessage::RestoreData => reply(controller.restore().await, profile),
    ClientWsMessage::ResetData => reply(controller.reset().await, |()| ServerWsMessage::Done),
  }
}
