use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use parley_types::api::{Claims, RoomSummary};

use crate::auth::AppState;

#[derive(Debug, Deserialize)]
pub struct RoomsQuery {
    pub search: Option<String>,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let rooms = state
        .db
        .list_rooms(query.search.as_deref())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(
        rooms
            .into_iter()
            .map(|r| RoomSummary { id: r.id, name: r.name })
            .collect::<Vec<_>>(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomQuery {
    pub name: String,
}

pub async fn create_room(
    State(state): State<AppState>,
    Query(query): Query<CreateRoomQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if query.name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if state
        .db
        .get_room_by_name(&query.name)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Key generation rides on the same create-on-first-use path the
    // WebSocket handshake uses, so a racing connect cannot mint a second
    // key for this name.
    let room = state
        .db
        .get_or_create_room(&query.name)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state
        .db
        .join_room(claims.sub, room.id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!("{} created room {}", claims.username, room.name);
    Ok((
        StatusCode::CREATED,
        Json(RoomSummary {
            id: room.id,
            name: room.name,
        }),
    ))
}

pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let room = state
        .db
        .get_room_by_id(room_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .db
        .join_room(claims.sub, room.id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({
        "message": format!("Joined room '{}'", room.name)
    })))
}
