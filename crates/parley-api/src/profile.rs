use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use parley_types::api::{Claims, ProfileResponse};

use crate::auth::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = state
        .db
        .get_user_by_id(claims.sub)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub username: Option<String>,
}

/// Rename the caller. A name held by another user is rejected; renaming
/// to your own current name (or omitting the field) is a no-op.
pub async fn update_profile(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = state
        .db
        .get_user_by_id(claims.sub)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let mut username = user.username;
    if let Some(new_name) = query.username.filter(|name| !name.is_empty()) {
        let taken = state
            .db
            .get_user_by_username(&new_name)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_some_and(|existing| existing.id != claims.sub);
        if taken {
            return Err(StatusCode::BAD_REQUEST);
        }

        state
            .db
            .update_username(claims.sub, &new_name)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        info!("{} renamed to {}", username, new_name);
        username = new_name;
    }

    Ok(Json(serde_json::json!({
        "message": "Profile updated",
        "username": username,
    })))
}
