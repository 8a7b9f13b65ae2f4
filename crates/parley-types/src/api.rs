use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared by the HTTP middleware and the WebSocket handshake.
/// Canonical definition lives here to keep both layers in agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

// -- Profile --

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
}

// -- Rooms --

#[derive(Debug, Serialize)]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
}

// -- Chat --

#[derive(Debug, Serialize)]
pub struct RoomKeyResponse {
    pub room: String,
    pub symmetric_key: String,
    pub user_filter: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct FilterResponse {
    pub room: String,
    pub filter_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub room: String,
    pub messages: Vec<HistoryMessage>,
    pub filter_enabled: bool,
}

/// One persisted message as returned by the history endpoint. `text` is a
/// best-effort server-side decryption for display; `ciphertext` is always
/// the stored blob.
#[derive(Debug, Serialize)]
pub struct HistoryMessage {
    pub id: i64,
    pub from: String,
    pub sender_id: i64,
    pub text: String,
    pub ciphertext: String,
    pub toxic: bool,
    pub prob: f64,
    pub timestamp: String,
}
