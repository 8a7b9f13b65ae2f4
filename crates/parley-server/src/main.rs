use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::auth::{self, AppState, AppStateInner};
use parley_api::chat;
use parley_api::middleware::require_auth;
use parley_api::profile;
use parley_api::rooms;
use parley_classifier::ClassifierGateway;
use parley_gateway::{Gateway, session};

#[derive(Clone)]
struct ServerState {
    gateway: Gateway,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PARLEY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let lexicon_path = std::env::var("PARLEY_LEXICON_PATH").ok().map(PathBuf::from);
    let threshold: f64 = std::env::var("PARLEY_TOXICITY_THRESHOLD")
        .unwrap_or_else(|_| "0.5".into())
        .parse()?;

    // Init database and classifier
    let db = Arc::new(parley_db::Database::open(&PathBuf::from(&db_path))?);
    let classifier = Arc::new(ClassifierGateway::load(lexicon_path.as_deref(), threshold));

    // Shared state
    let gateway = Gateway::new(db.clone(), classifier, jwt_secret.clone());
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/rooms", get(rooms::list_rooms))
        .route("/chat/{room}/key", get(chat::get_room_key))
        .route("/chat/{room}/history", get(chat::get_history))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route(
            "/profile",
            get(profile::get_profile).patch(profile::update_profile),
        )
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/{room_id}/join", post(rooms::join_room))
        .route("/chat/{room}/filter", post(chat::set_room_filter))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/chat/ws/{room}", get(ws_upgrade))
        .with_state(ServerState { gateway });

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parley relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Path(room): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(socket, state.gateway, room, query.token))
}
