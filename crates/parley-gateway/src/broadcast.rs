use tracing::trace;
use uuid::Uuid;

use parley_db::models::MessageRow;
use parley_types::frames::{DeliveryFrame, PresenceStatus, SignalFrame};

use crate::registry::Registry;

/// Fixed note delivered in place of a filtered message.
pub const HIDDEN_NOTE: &str = "Message hidden due to your filter setting.";

/// Fan-out of presence, typing and message events to a room's connections.
///
/// Every send is best-effort and at-most-once: a dead peer is skipped and
/// cleaned up by its own session's unregister, never by the broadcaster.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Registry,
}

impl Broadcaster {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Presence goes to every connection in the room, the subject's own
    /// sessions included.
    pub fn presence(&self, room: &str, username: &str, status: PresenceStatus) {
        for peer in self.registry.snapshot(room) {
            let delivered = peer.send(
                SignalFrame::Presence {
                    user: username.to_string(),
                    status,
                }
                .into(),
            );
            if !delivered {
                trace!(room, conn = %peer.conn_id, "presence skipped dead peer");
            }
        }
    }

    /// Typing goes to everyone in the room except the originating
    /// connection — other sessions of the same user still see it.
    pub fn typing(&self, room: &str, origin: Uuid, from: &str, is_typing: bool) {
        for peer in self.registry.snapshot(room) {
            if peer.conn_id == origin {
                continue;
            }
            let delivered = peer.send(
                SignalFrame::Typing {
                    from: from.to_string(),
                    is_typing,
                }
                .into(),
            );
            if !delivered {
                trace!(room, conn = %peer.conn_id, "typing skipped dead peer");
            }
        }
    }

    /// Deliver a persisted message to the room, deciding per recipient:
    /// a flagged message becomes a redacted notice for connections whose
    /// cached filter preference is on. The classifier ran exactly once —
    /// only its stored label is consulted here.
    pub fn message(&self, room: &str, stored: &MessageRow) {
        for peer in self.registry.snapshot(room) {
            let frame = if stored.is_toxic && peer.filter_enabled {
                DeliveryFrame::MessageHidden {
                    id: stored.id,
                    note: HIDDEN_NOTE.to_string(),
                }
            } else {
                DeliveryFrame::Message {
                    id: stored.id,
                    from_user_id: stored.sender_id,
                    from_username: peer.username.clone(),
                    timestamp: stored.timestamp.clone(),
                    is_toxic: stored.is_toxic,
                    prob: stored.toxicity_prob,
                    ciphertext: stored.ciphertext.clone(),
                }
            };
            if !peer.send(frame.into()) {
                trace!(room, conn = %peer.conn_id, "message skipped dead peer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::frames::ServerFrame;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn wired_room() -> (
        Broadcaster,
        Registry,
        (Uuid, UnboundedReceiver<ServerFrame>),
        (Uuid, UnboundedReceiver<ServerFrame>),
    ) {
        let registry = Registry::new();
        let (alice, rx_a) = registry.register("general", 1, "alice".into(), false);
        let (bob, rx_b) = registry.register("general", 2, "bob".into(), true);
        (
            Broadcaster::new(registry.clone()),
            registry,
            (alice.conn_id, rx_a),
            (bob.conn_id, rx_b),
        )
    }

    fn recv_value(rx: &mut UnboundedReceiver<ServerFrame>) -> serde_json::Value {
        let frame = rx.try_recv().expect("expected a frame");
        serde_json::to_value(&frame).unwrap()
    }

    fn stored(is_toxic: bool, prob: f64) -> MessageRow {
        MessageRow {
            id: 42,
            room_id: 1,
            sender_id: 1,
            ciphertext: "Y2lwaGVydGV4dA==".into(),
            is_toxic,
            toxicity_prob: prob,
            timestamp: "2026-08-25T12:00:00+00:00".into(),
        }
    }

    #[test]
    fn presence_reaches_every_connection() {
        let (broadcaster, _registry, (_, mut rx_a), (_, mut rx_b)) = wired_room();
        broadcaster.presence("general", "alice", PresenceStatus::Online);

        for rx in [&mut rx_a, &mut rx_b] {
            let value = recv_value(rx);
            assert_eq!(value["event"], "presence");
            assert_eq!(value["user"], "alice");
            assert_eq!(value["status"], "online");
        }
    }

    #[test]
    fn typing_excludes_origin_connection() {
        let (broadcaster, _registry, (alice_conn, mut rx_a), (_, mut rx_b)) = wired_room();
        broadcaster.typing("general", alice_conn, "alice", true);

        assert!(rx_a.try_recv().is_err(), "origin must not see its own typing");
        let value = recv_value(&mut rx_b);
        assert_eq!(value["event"], "typing");
        assert_eq!(value["from"], "alice");
        assert_eq!(value["is_typing"], true);
    }

    #[test]
    fn clean_message_delivered_in_full_to_all() {
        let (broadcaster, _registry, (_, mut rx_a), (_, mut rx_b)) = wired_room();
        broadcaster.message("general", &stored(false, 0.2));

        for rx in [&mut rx_a, &mut rx_b] {
            let value = recv_value(rx);
            assert_eq!(value["type"], "message");
            assert_eq!(value["id"], 42);
            assert_eq!(value["is_toxic"], false);
            assert_eq!(value["ciphertext"], "Y2lwaGVydGV4dA==");
        }
    }

    #[test]
    fn toxic_message_redacted_only_for_filtering_recipient() {
        let (broadcaster, _registry, (_, mut rx_a), (_, mut rx_b)) = wired_room();
        broadcaster.message("general", &stored(true, 0.97));

        // alice has the filter off: full payload, ciphertext intact.
        let full = recv_value(&mut rx_a);
        assert_eq!(full["type"], "message");
        assert_eq!(full["is_toxic"], true);
        assert_eq!(full["ciphertext"], "Y2lwaGVydGV4dA==");

        // bob has the filter on: redacted notice, no content fields.
        let hidden = recv_value(&mut rx_b);
        assert_eq!(hidden["type"], "message_hidden");
        assert_eq!(hidden["id"], 42);
        assert_eq!(hidden["note"], HIDDEN_NOTE);
        assert!(hidden.get("ciphertext").is_none());
    }

    #[test]
    fn dead_peer_does_not_abort_fanout() {
        let (broadcaster, _registry, (_, rx_a), (_, mut rx_b)) = wired_room();
        drop(rx_a); // alice's writer task is gone

        broadcaster.message("general", &stored(false, 0.0));
        let value = recv_value(&mut rx_b);
        assert_eq!(value["type"], "message");
    }

    #[test]
    fn broadcast_to_empty_room_is_a_noop() {
        let registry = Registry::new();
        let broadcaster = Broadcaster::new(registry);
        broadcaster.presence("ghost-room", "alice", PresenceStatus::Offline);
        broadcaster.message("ghost-room", &stored(false, 0.0));
    }
}
