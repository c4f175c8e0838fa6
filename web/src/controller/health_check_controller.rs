use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

/// GET the relay's current upstream and client status
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.relay.status())
}
