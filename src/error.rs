//! Error kinds surfaced by the game core and its gateways.
//!
//! None of these are fatal: connectivity and persistence failures are shown to
//! the player as a dismissible notice while the in-memory profile/session stay
//! authoritative until the next successful save.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;

use crate::domain::GameState;

/// Leaderboard / social gateway failures. The mock gateway only ever
/// produces `NoConnection`; the rest are for a networked gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectivityError {
  #[error("No internet connection available")]
  NoConnection,
  #[allow(dead_code)]
  #[error("Cannot reach game servers")]
  ServerUnreachable,
  #[allow(dead_code)]
  #[error("Invalid response from server")]
  InvalidResponse,
  #[allow(dead_code)]
  #[error("Too many requests. Please try again later")]
  RateLimited,
  #[allow(dead_code)]
  #[error("Server error ({0})")]
  ServerError(u16),
}

/// Underlying cause of a persistence failure.
#[derive(Debug, Error)]
pub enum StoreFailure {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

/// Persistence gateway failures, one kind per operation.
#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("Failed to load data: {0}")]
  Load(#[source] StoreFailure),
  #[error("Failed to save data: {0}")]
  Save(#[source] StoreFailure),
  #[error("Failed to export data: {0}")]
  Export(#[source] StoreFailure),
  #[error("Failed to import data: {0}")]
  Import(#[source] StoreFailure),
  #[error("Failed to reset data: {0}")]
  Reset(#[source] StoreFailure),
  #[error("Failed to create backup: {0}")]
  Backup(#[source] StoreFailure),
  #[error("Failed to restore backup: {0}")]
  Restore(#[source] StoreFailure),
  #[error("No backup file found")]
  NoBackupFound,
}

impl PersistenceError {
  pub fn load(e: impl Into<StoreFailure>) -> Self { Self::Load(e.into()) }
  pub fn save(e: impl Into<StoreFailure>) -> Self { Self::Save(e.into()) }
  pub fn export(e: impl Into<StoreFailure>) -> Self { Self::Export(e.into()) }
  pub fn import(e: impl Into<StoreFailure>) -> Self { Self::Import(e.into()) }
  pub fn reset(e: impl Into<StoreFailure>) -> Self { Self::Reset(e.into()) }
  pub fn backup(e: impl Into<StoreFailure>) -> Self { Self::Backup(e.into()) }
  pub fn restore(e: impl Into<StoreFailure>) -> Self { Self::Restore(e.into()) }
}

/// Username rules: 3-20 characters, letters/digits plus `_` and `-`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("Username cannot be empty")]
  EmptyUsername,
  #[error("Username must be at least 3 characters")]
  UsernameTooShort,
  #[error("Username must be at most 20 characters")]
  UsernameTooLong,
  #[error("Username can only contain letters, numbers, _ and -")]
  UsernameInvalidCharacters,
}

/// A state-machine call made from a state that does not allow it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("cannot {action} while {state}")]
  InvalidTransition { action: &'static str, state: GameState },
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Connectivity(#[from] ConnectivityError),
  #[error(transparent)]
  Persistence(#[from] PersistenceError),
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error(transparent)]
  Session(#[from] SessionError),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("game controller is not running")]
  Unavailable,
}

impl AppError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::Session(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Connectivity(ConnectivityError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
      AppError::Connectivity(_) | AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Persistence(PersistenceError::NoBackupFound) => StatusCode::NOT_FOUND,
      AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Short machine-readable kind used in API error bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::Connectivity(_) => "connectivity",
      AppError::Persistence(_) => "persistence",
      AppError::Validation(_) => "validation",
      AppError::Session(_) => "invalid_transition",
      AppError::NotFound(_) => "not_found",
      AppError::Unavailable => "unavailable",
    }
  }
}

/// JSON body returned for failed API calls.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
  pub status: &'static str,
  pub code: u16,
  pub message: String,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    let body = ApiErrorBody { status: self.kind(), code: status.as_u16(), message: self.to_string() };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn persistence_messages_wrap_cause() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = PersistenceError::save(io);
    assert_eq!(err.to_string(), "Failed to save data: denied");
    assert!(std::error::Error::source(&err).is_some());
  }

  #[test]
  fn status_codes_follow_error_kind() {
    let v = AppError::from(ValidationError::UsernameTooShort);
    assert_eq!(v.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(v.kind(), "validation");

    let c = AppError::from(ConnectivityError::NoConnection);
    assert_eq!(c.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    let s = AppError::from(SessionError::InvalidTransition { action: "pause", state: GameState::Menu });
    assert_eq!(s.to_string(), "cannot pause while menu");
    assert_eq!(s.status_code(), StatusCode::BAD_REQUEST);

    let missing = AppError::from(PersistenceError::NoBackupFound);
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn networked_gateway_errors_map_to_statuses() {
    let limited = AppError::from(ConnectivityError::RateLimited);
    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.kind(), "connectivity");

    for e in [ConnectivityError::ServerUnreachable, ConnectivityError::InvalidResponse, ConnectivityError::ServerError(502)] {
      assert_eq!(AppError::from(e).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(ConnectivityError::ServerError(502).to_string(), "Server error (502)");
  }
}
