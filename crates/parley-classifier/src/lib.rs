//! Parley content classifier.
//!
//! Scores message plaintext for toxicity before fan-out. The scoring model
//! is a weighted lexicon loaded at startup; the gateway wraps it so the
//! message pipeline sees a single stateless `classify` call that degrades
//! to "not toxic" whenever no model is available. Inference shares its
//! text-normalization contract with (external) batch retraining.

pub mod gateway;
pub mod lexicon;
pub mod text;

pub use gateway::{ClassifierGateway, Verdict};
pub use lexicon::Lexicon;
pub use text::normalize;
