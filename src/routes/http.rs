//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{State, Query}, http::StatusCode, Json, response::{IntoResponse, Response}};
use tracing::{error, info, instrument};

use crate::domain::Round;
use crate::protocol::*;
use crate::state::AppState;
use crate::store::PersistedStats;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, problems: state.catalog.len(), source: state.source.describe() })
}

#[instrument(level = "info", skip(state), fields(round = ?q.round, rating = ?q.rating))]
pub async fn http_get_problem(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ProblemQuery>,
) -> Response {
  match state.pick_for_query(&q) {
    Some(problem) => {
      info!(target: "selector", id = %problem.id, difficulty = problem.difficulty, "HTTP problem served");
      Json(ProblemOut { problem }).into_response()
    }
    None => {
      error!(target: "selector", "No problem available; catalog is misconfigured");
      (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": "no problem available" }))).into_response()
    }
  }
}

#[instrument(level = "info")]
pub async fn http_get_rounds() -> impl IntoResponse {
  let mut rounds = vec!["All"];
  rounds.extend(Round::ALL.iter().map(Round::as_str));
  Json(RoundsOut { rounds })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let stats = PersistedStats::load(state.store.as_ref());
  Json(StatsOut {
    best_streak: stats.best_streak,
    all_time_solved: stats.all_time_solved,
    dark_mode: stats.dark_mode,
  })
}
