use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use parley_crypto::{codec, keys};
use parley_types::api::{
    Claims, FilterResponse, HistoryMessage, HistoryResponse, RoomKeyResponse,
};

use crate::auth::AppState;
use crate::middleware::claims_from_headers;

/// Shown in history when a stored blob no longer decrypts under the room
/// key. The relay path never does this substitution — it always forwards
/// ciphertext untouched.
const DECRYPT_SENTINEL: &str = "[decryption_error]";

/// Hand out the room's symmetric key, creating the room on first
/// reference. Authentication is optional here; with a valid token the
/// caller's filter preference rides along.
pub async fn get_room_key(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let room = state
        .db
        .get_or_create_room(&room_name)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user_filter = match claims_from_headers(&headers, &state.jwt_secret) {
        Some(claims) => Some(
            state
                .db
                .get_filter_setting(claims.sub, room.id)
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
        ),
        None => None,
    };

    Ok(Json(RoomKeyResponse {
        room: room.name,
        symmetric_key: room.symmetric_key,
        user_filter,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub enabled: bool,
}

/// Upsert the caller's per-room filter preference. Live connections keep
/// their connect-time snapshot; the new value applies on reconnect.
pub async fn set_room_filter(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
    Query(query): Query<FilterQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let room = state
        .db
        .get_room_by_name(&room_name)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .db
        .set_filter_setting(claims.sub, room.id, query.enabled)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(FilterResponse {
        room: room.name,
        filter_enabled: query.enabled,
    }))
}

/// Room history with best-effort server-side decryption for display.
/// A caller with the filter on gets flagged rows elided entirely.
pub async fn get_history(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let room = state
        .db
        .get_room_by_name(&room_name)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let filter_enabled = match claims_from_headers(&headers, &state.jwt_secret) {
        Some(claims) => state
            .db
            .get_filter_setting(claims.sub, room.id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
        None => false,
    };

    // Run the blocking history query off the async runtime.
    let db = state.db.clone();
    let room_id = room.id;
    let rows = tokio::task::spawn_blocking(move || db.get_history(room_id, filter_enabled))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let room_key = keys::key_from_base64(&room.symmetric_key).ok();
    let messages: Vec<HistoryMessage> = rows
        .into_iter()
        .map(|row| {
            let text = room_key
                .as_ref()
                .and_then(|key| codec::decrypt(key, &row.message.ciphertext).ok())
                .unwrap_or_else(|| DECRYPT_SENTINEL.to_string());

            HistoryMessage {
                id: row.message.id,
                from: row.sender_username,
                sender_id: row.message.sender_id,
                text,
                ciphertext: row.message.ciphertext,
                toxic: row.message.is_toxic,
                prob: row.message.toxicity_prob,
                timestamp: row.message.timestamp,
            }
        })
        .collect();

    Ok(Json(HistoryResponse {
        room: room.name,
        messages,
        filter_enabled,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::AppStateInner;
    use parley_db::Database;

    #[tokio::test]
    async fn undecryptable_history_rows_get_the_sentinel() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let user = db.create_user("alice", "argon2-hash").unwrap();
        let room = db.get_or_create_room("general").unwrap();
        db.append_message(room.id, user, "%%% not a blob %%%", false, 0.0)
            .unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: "secret".into(),
        });

        let response = get_history(State(state), Path("general".into()), HeaderMap::new())
            .await
            .unwrap()
            .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["messages"][0]["text"], "[decryption_error]");
        // The stored blob itself is still returned untouched.
        assert_eq!(value["messages"][0]["ciphertext"], "%%% not a blob %%%");
    }
}
