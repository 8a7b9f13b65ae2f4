use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// Score contributed by a lexicon term that carries no explicit weight.
const DEFAULT_TERM_WEIGHT: f64 = 0.6;
/// Score contributed by each spam heuristic hit.
const HEURISTIC_WEIGHT: f64 = 0.1;

fn repeated_chars_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(.)\1{4,}").expect("Repeated character regex pattern is valid"))
}

fn repeated_punct_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[!?]{4,}").expect("Punctuation regex pattern is valid"))
}

/// Weighted-term scoring model.
///
/// The lexicon file has one term per line, optionally followed by a weight
/// in (0, 1]; `#` lines and blanks are ignored:
///
/// ```text
/// # strong insults
/// badword 0.9
/// mildword
/// ```
///
/// Scores are additive over distinct matched terms plus two spam
/// heuristics, capped at 1.0. Input is expected to be pre-normalized.
pub struct Lexicon {
    weights: HashMap<String, f64>,
}

impl Lexicon {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed to load lexicon from {}", path.as_ref().display())
        })?;

        let mut weights = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(term) = parts.next() else { continue };
            let weight = parts
                .next()
                .and_then(|w| w.parse::<f64>().ok())
                .unwrap_or(DEFAULT_TERM_WEIGHT)
                .clamp(0.0, 1.0);
            weights.insert(term.to_lowercase(), weight);
        }

        Ok(Self { weights })
    }

    pub fn term_count(&self) -> usize {
        self.weights.len()
    }

    /// Score normalized text in [0, 1].
    pub fn score(&self, normalized: &str) -> f64 {
        if normalized.is_empty() {
            return 0.0;
        }

        let mut score: f64 = 0.0;
        let mut seen: Vec<&str> = Vec::new();
        for word in normalized.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() || seen.contains(&word) {
                continue;
            }
            if let Some(weight) = self.weights.get(word) {
                score += weight;
                seen.push(word);
            }
        }

        if repeated_chars_pattern().is_match(normalized) {
            score += HEURISTIC_WEIGHT;
        }
        if repeated_punct_pattern().is_match(normalized) {
            score += HEURISTIC_WEIGHT;
        }

        score.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_lexicon() -> Lexicon {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment line").unwrap();
        writeln!(file, "badword 0.9").unwrap();
        writeln!(file, "awful 0.4").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "mildword").unwrap();
        Lexicon::load(file.path()).unwrap()
    }

    #[test]
    fn loads_terms_skipping_comments() {
        let lexicon = test_lexicon();
        assert_eq!(lexicon.term_count(), 3);
    }

    #[test]
    fn safe_text_scores_zero() {
        let lexicon = test_lexicon();
        assert_eq!(lexicon.score("a perfectly pleasant message"), 0.0);
        assert_eq!(lexicon.score(""), 0.0);
    }

    #[test]
    fn weighted_terms_accumulate() {
        let lexicon = test_lexicon();
        assert_eq!(lexicon.score("what a badword"), 0.9);
        let combined = lexicon.score("badword and awful");
        assert!((combined - 1.0).abs() < 1e-9, "0.9 + 0.4 caps at 1.0");
    }

    #[test]
    fn repeated_term_counts_once() {
        let lexicon = test_lexicon();
        assert_eq!(lexicon.score("awful awful awful"), 0.4);
    }

    #[test]
    fn default_weight_applies() {
        let lexicon = test_lexicon();
        assert!((lexicon.score("mildword") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn spam_heuristics_add_up() {
        let lexicon = test_lexicon();
        assert!((lexicon.score("hellooooo") - 0.1).abs() < 1e-9);
        assert!((lexicon.score("what!!!!!") - 0.1).abs() < 1e-9);
        assert!((lexicon.score("awful hellooooo!!!!!") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Lexicon::load("/nonexistent/lexicon.txt").is_err());
    }
}
