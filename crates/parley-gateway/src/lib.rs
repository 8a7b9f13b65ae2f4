//! Parley gateway: the real-time message path.
//!
//! One task pair per WebSocket connection. Inbound chat messages run the
//! decrypt → classify → persist → fan-out pipeline; fan-out pushes frames
//! onto per-connection channels so a slow or dead peer never blocks the
//! sender. The registry is the only shared mutable state and is locked
//! per room.

pub mod broadcast;
pub mod pipeline;
pub mod registry;
pub mod session;

use std::sync::Arc;

use parley_classifier::ClassifierGateway;
use parley_db::Database;

use crate::broadcast::Broadcaster;
use crate::pipeline::Pipeline;
use crate::registry::Registry;

/// Everything a session handler needs, cloned per connection.
#[derive(Clone)]
pub struct Gateway {
    pub db: Arc<Database>,
    pub registry: Registry,
    pub broadcaster: Broadcaster,
    pub pipeline: Arc<Pipeline>,
    pub jwt_secret: String,
}

impl Gateway {
    pub fn new(db: Arc<Database>, classifier: Arc<ClassifierGateway>, jwt_secret: String) -> Self {
        let registry = Registry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        let pipeline = Arc::new(Pipeline::new(db.clone(), classifier, broadcaster.clone()));
        Self {
            db,
            registry,
            broadcaster,
            pipeline,
            jwt_secret,
        }
    }
}
