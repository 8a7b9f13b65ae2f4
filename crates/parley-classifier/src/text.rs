use std::sync::OnceLock;

use regex::Regex;

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"http\S+").expect("URL regex pattern is valid"))
}

fn whitespace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Whitespace regex pattern is valid"))
}

/// Normalize text before scoring: lowercase, newlines to spaces, URL-like
/// tokens stripped, runs of whitespace collapsed, ends trimmed.
///
/// Training pipelines apply this same function to their corpus, so any
/// change here changes the meaning of the persisted threshold.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace('\n', " ");
    let stripped = url_pattern().replace_all(&lowered, "");
    whitespace_pattern()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize("  HeLLo World  "), "hello world");
    }

    #[test]
    fn collapses_newlines_and_spaces() {
        assert_eq!(normalize("one\ntwo\n\n  three"), "one two three");
    }

    #[test]
    fn strips_urls() {
        assert_eq!(
            normalize("look at https://example.com/x?y=1 now"),
            "look at now"
        );
        assert_eq!(normalize("http://only.a.link"), "");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n  "), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize("SHOUTING at\nhttps://a.b and   more");
        assert_eq!(normalize(&once), once);
    }
}
