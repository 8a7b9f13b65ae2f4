use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, info, warn};

use parley_db::models::UserRow;
use parley_types::api::Claims;
use parley_types::frames::{ClientFrame, ClientSignal, PresenceStatus, SignalFrame};

use crate::Gateway;

/// Policy violation: missing/invalid token at handshake.
const CLOSE_POLICY: u16 = 1008;
/// Internal error: the store was unavailable during handshake.
const CLOSE_INTERNAL: u16 = 1011;

/// Own one WebSocket connection's lifecycle: authenticate, register, run
/// the read loop, and unconditionally clean up.
pub async fn handle_socket(
    socket: WebSocket,
    gateway: Gateway,
    room_name: String,
    token: Option<String>,
) {
    let Some(token) = token else {
        close_with(socket, CLOSE_POLICY, "missing token").await;
        return;
    };

    let user = match authenticate(&gateway, &token).await {
        Some(user) => user,
        None => {
            warn!(room = %room_name, "WebSocket client failed to authenticate, closing");
            close_with(socket, CLOSE_POLICY, "invalid token").await;
            return;
        }
    };

    // Resolve the room and snapshot the caller's filter preference before
    // any frame is exchanged.
    let (room, filter_enabled) = {
        let db = gateway.db.clone();
        let name = room_name.clone();
        let user_id = user.id;
        let resolved = tokio::task::spawn_blocking(move || {
            let room = db.get_or_create_room(&name)?;
            let filter = db.get_filter_setting(user_id, room.id)?;
            Ok::<_, parley_db::StoreError>((room, filter))
        })
        .await;
        match resolved {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                warn!(room = %room_name, %err, "store unavailable during handshake");
                close_with(socket, CLOSE_INTERNAL, "store unavailable").await;
                return;
            }
            Err(err) => {
                warn!(room = %room_name, %err, "handshake task failed");
                close_with(socket, CLOSE_INTERNAL, "internal error").await;
                return;
            }
        }
    };

    info!("{} ({}) connected to room {}", user.username, user.id, room.name);

    let (mut sink, mut stream) = socket.split();

    let (peer, mut frames_rx) =
        gateway
            .registry
            .register(&room.name, user.id, user.username.clone(), filter_enabled);
    gateway
        .broadcaster
        .presence(&room.name, &user.username, PresenceStatus::Online);

    // Writer task: drains this connection's frame channel so fan-out from
    // other connections never waits on this socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            let text = serde_json::to_string(&frame).unwrap();
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader task: dispatch typing signals straight to the broadcaster and
    // message payloads into the pipeline.
    let recv_gateway = gateway.clone();
    let recv_peer = peer.clone();
    let recv_room = room.clone();
    let username = user.username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => {
                    let frame = match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => frame,
                        Err(err) => {
                            debug!(%username, %err, "dropping unrecognized frame");
                            continue;
                        }
                    };
                    match frame {
                        ClientFrame::Signal(ClientSignal::Typing { is_typing }) => {
                            recv_gateway.broadcaster.typing(
                                &recv_room.name,
                                recv_peer.conn_id,
                                &username,
                                is_typing,
                            );
                        }
                        ClientFrame::Message { ciphertext } => {
                            if let Err(err) = recv_gateway
                                .pipeline
                                .handle_message(&recv_room, &recv_peer, ciphertext)
                                .await
                            {
                                warn!(%username, room = %recv_room.name, %err, "message not stored");
                                recv_peer.send(
                                    SignalFrame::Error {
                                        message: "message could not be stored".to_string(),
                                    }
                                    .into(),
                                );
                            }
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Both cleanup steps run on every exit path, including task failure.
    gateway.registry.unregister(&room.name, peer.conn_id);
    gateway
        .broadcaster
        .presence(&room.name, &user.username, PresenceStatus::Offline);

    info!("{} ({}) disconnected from room {}", user.username, user.id, room.name);
}

/// Validate the bearer token and resolve it to a stored user.
async fn authenticate(gateway: &Gateway, token: &str) -> Option<UserRow> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(gateway.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    let db = gateway.db.clone();
    let user_id = token_data.claims.sub;
    tokio::task::spawn_blocking(move || db.get_user_by_id(user_id))
        .await
        .ok()?
        .ok()?
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
