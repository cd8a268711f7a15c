use crate::interface_adapters::protocol::StatsDto;
use crate::interface_adapters::state::AppState;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use std::sync::Arc;

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Copy out of the watch slots; never hold a borrow across the response.
    let loop_stats = *state.loop_stats.borrow();
    let activity = *state.activity.borrow();
    Json(StatsDto::new(state.accepting_sessions(), loop_stats, activity))
}
