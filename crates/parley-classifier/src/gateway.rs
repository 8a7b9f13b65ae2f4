use std::path::Path;

use tracing::{info, warn};

use crate::lexicon::Lexicon;
use crate::text::normalize;

/// Outcome of classifying one message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub toxic: bool,
    pub prob: f64,
}

impl Verdict {
    /// The degraded result used whenever no model is available.
    pub const CLEAN: Verdict = Verdict {
        toxic: false,
        prob: 0.0,
    };
}

/// Stateless scoring front for the message pipeline.
///
/// Classification is best-effort: a missing or unloadable model must never
/// block message delivery, so it degrades to [`Verdict::CLEAN`] instead of
/// surfacing an error.
pub struct ClassifierGateway {
    model: Option<Lexicon>,
    threshold: f64,
}

impl ClassifierGateway {
    pub fn new(model: Option<Lexicon>, threshold: f64) -> Self {
        Self { model, threshold }
    }

    /// Load the lexicon from `path` if given. A load failure logs and
    /// leaves the gateway running without a model.
    pub fn load(path: Option<&Path>, threshold: f64) -> Self {
        let model = match path {
            Some(path) => match Lexicon::load(path) {
                Ok(lexicon) => {
                    info!(terms = lexicon.term_count(), "toxicity lexicon loaded");
                    Some(lexicon)
                }
                Err(err) => {
                    warn!("failed to load toxicity lexicon: {err:#}");
                    None
                }
            },
            None => {
                info!("no toxicity lexicon configured, classification disabled");
                None
            }
        };
        Self::new(model, threshold)
    }

    /// Score raw message text. The label is `true` iff the probability
    /// reaches the configured threshold.
    pub fn classify(&self, text: &str) -> Verdict {
        let Some(model) = &self.model else {
            return Verdict::CLEAN;
        };

        let prob = model.score(&normalize(text));
        Verdict {
            toxic: prob >= self.threshold,
            prob,
        }
    }
}
