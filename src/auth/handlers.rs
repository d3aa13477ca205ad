use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use super::{dto::AuthenticateRequest, services};
use crate::{
    error::ApiResult, extract::AppJson, state::AppState, users::repo_types::PublicUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/authenticate", post(authenticate))
}

#[instrument(skip(state, payload))]
pub async fn authenticate(
    State(state): State<AppState>,
    AppJson(payload): AppJson<AuthenticateRequest>,
) -> ApiResult<Json<PublicUser>> {
    let user = services::authenticate(state.users.as_ref(), &payload).await?;
    Ok(Json(user))
}
