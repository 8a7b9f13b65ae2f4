use serde::{Deserialize, Serialize};

/// Frames sent FROM client TO server over an open connection.
///
/// Two shapes are accepted: a typing signal tagged by `event`, and a chat
/// message carrying only a `ciphertext` field. Anything else is dropped by
/// the session read loop without closing the connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Signal(ClientSignal),
    Message { ciphertext: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientSignal {
    Typing {
        #[serde(default)]
        is_typing: bool,
    },
}

/// Frames sent FROM server TO client.
///
/// The wire format distinguishes control-plane frames (tagged by `event`)
/// from message deliveries (tagged by `type`), so this is a thin untagged
/// wrapper over the two tagged enums.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Signal(SignalFrame),
    Delivery(DeliveryFrame),
}

impl From<SignalFrame> for ServerFrame {
    fn from(frame: SignalFrame) -> Self {
        Self::Signal(frame)
    }
}

impl From<DeliveryFrame> for ServerFrame {
    fn from(frame: DeliveryFrame) -> Self {
        Self::Delivery(frame)
    }
}

/// Presence, typing and sender-scoped error frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SignalFrame {
    Presence {
        user: String,
        status: PresenceStatus,
    },
    Typing {
        from: String,
        is_typing: bool,
    },
    /// Delivered only to the connection whose message failed to persist.
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Message deliveries. A recipient with the filter enabled receives
/// `MessageHidden` in place of a flagged message; everyone else gets the
/// full frame. Plaintext never appears here — clients decrypt locally.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryFrame {
    Message {
        id: i64,
        from_user_id: i64,
        from_username: String,
        timestamp: String,
        is_toxic: bool,
        prob: f64,
        ciphertext: String,
    },
    MessageHidden { id: i64, note: String },
}
