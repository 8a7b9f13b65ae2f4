use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use parley_classifier::ClassifierGateway;
use parley_crypto::{codec, keys};
use parley_db::models::RoomRow;
use parley_db::{Database, StoreError};

use crate::broadcast::Broadcaster;
use crate::registry::Peer;

/// A message that could not complete the pipeline. Only persistence
/// failures surface here — decryption and classification degrade in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("persistence task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Orchestrates one inbound message: decrypt, classify, persist, fan out.
pub struct Pipeline {
    db: Arc<Database>,
    classifier: Arc<ClassifierGateway>,
    broadcaster: Broadcaster,
}

impl Pipeline {
    pub fn new(
        db: Arc<Database>,
        classifier: Arc<ClassifierGateway>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            db,
            classifier,
            broadcaster,
        }
    }

    /// Run one ciphertext payload through the pipeline.
    ///
    /// An undecryptable payload is still stored and relayed as ciphertext;
    /// only its classification degrades (empty text scores clean). A store
    /// failure aborts before any broadcast — a message no one can fetch
    /// later must not appear for anyone now.
    pub async fn handle_message(
        &self,
        room: &RoomRow,
        sender: &Peer,
        ciphertext: String,
    ) -> Result<(), PipelineError> {
        let plaintext = match keys::key_from_base64(&room.symmetric_key)
            .and_then(|key| codec::decrypt(&key, &ciphertext))
        {
            Ok(text) => text,
            Err(err) => {
                debug!(room = %room.name, %err, "undecryptable payload, classifying empty text");
                String::new()
            }
        };

        let verdict = self.classifier.classify(&plaintext);

        let db = self.db.clone();
        let (room_id, sender_id) = (room.id, sender.user_id);
        let blob = ciphertext.clone();
        let stored = tokio::task::spawn_blocking(move || {
            db.append_message(room_id, sender_id, &blob, verdict.toxic, verdict.prob)
        })
        .await??;

        self.broadcaster.message(&room.name, &stored);
        Ok(())
    }
}
