use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use uuid::Uuid;

use parley_types::frames::ServerFrame;

/// One live connection as the fan-out path sees it.
///
/// `filter_enabled` is a snapshot taken at connect time; a user who flips
/// the setting mid-session picks it up on reconnect.
#[derive(Clone)]
pub struct Peer {
    pub conn_id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub filter_enabled: bool,
    sender: UnboundedSender<ServerFrame>,
}

impl Peer {
    /// Queue a frame for this connection's writer task. Returns false if
    /// the connection is gone; callers treat that as a skipped delivery.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.sender.send(frame).is_ok()
    }
}

/// Live connections grouped by room name.
///
/// The outer map lock is held only to reach a room's entry; each room's
/// connection set has its own mutex, so traffic in one room never blocks
/// register/unregister/broadcast in another. Sends are non-blocking pushes
/// onto unbounded channels, so no lock is ever held across I/O. A poisoned
/// lock is recovered rather than propagated: push/retain leave the peer
/// lists consistent even if the holding task panicked.
#[derive(Clone, Default)]
pub struct Registry {
    rooms: Arc<RwLock<HashMap<String, Arc<Mutex<Vec<Peer>>>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Returns the peer handle and the
    /// receiving end its writer task drains.
    pub fn register(
        &self,
        room: &str,
        user_id: i64,
        username: String,
        filter_enabled: bool,
    ) -> (Peer, UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = unbounded_channel();
        let peer = Peer {
            conn_id: Uuid::new_v4(),
            user_id,
            username,
            filter_enabled,
            sender: tx,
        };

        let existing = {
            let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
            rooms.get(room).cloned()
        };
        match existing {
            Some(set) => set.lock().unwrap_or_else(|e| e.into_inner()).push(peer.clone()),
            None => {
                let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
                rooms
                    .entry(room.to_string())
                    .or_default()
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(peer.clone());
            }
        }

        (peer, rx)
    }

    /// Remove a connection; the room entry itself is dropped once its last
    /// connection leaves.
    pub fn unregister(&self, room: &str, conn_id: Uuid) {
        let now_empty = {
            let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
            match rooms.get(room) {
                Some(set) => {
                    let mut peers = set.lock().unwrap_or_else(|e| e.into_inner());
                    peers.retain(|p| p.conn_id != conn_id);
                    peers.is_empty()
                }
                None => false,
            }
        };

        if now_empty {
            let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
            // Re-check under the write lock; a new connection may have
            // registered in between.
            let still_empty = rooms
                .get(room)
                .is_some_and(|set| set.lock().unwrap_or_else(|e| e.into_inner()).is_empty());
            if still_empty {
                rooms.remove(room);
            }
        }
    }

    /// Snapshot of a room's connections for iteration by the broadcaster.
    pub fn snapshot(&self, room: &str) -> Vec<Peer> {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        match rooms.get(room) {
            Some(set) => set.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            None => Vec::new(),
        }
    }

    /// Number of rooms with at least one live connection.
    pub fn active_rooms(&self) -> usize {
        self.rooms.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
