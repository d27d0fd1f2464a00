//! Confirmation classifier - yes/no/repeat answers while a move is pending
//!
//! Categories are scanned in order CONFIRM, CANCEL, REPEAT and the first one
//! with a matching keyword wins. Matching is by substring unless whole-word
//! mode is switched on in the config: "nonsense" contains "no" and counts as
//! a cancel, "rook" contains "ok" and counts as a confirm.

use std::fmt;

const CONFIRM_WORDS: [&str; 9] = [
    "confirm", "yes", "yeah", "yep", "ok", "okay", "go", "do it", "accept",
];
const CANCEL_WORDS: [&str; 6] = ["cancel", "no", "nope", "stop", "reject", "discard"];
const REPEAT_WORDS: [&str; 5] = ["repeat", "say again", "again", "what", "pardon"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Confirm,
    Cancel,
    Repeat,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Confirm => write!(f, "confirm"),
            Verdict::Cancel => write!(f, "cancel"),
            Verdict::Repeat => write!(f, "repeat"),
            Verdict::Unknown => write!(f, "unknown"),
        }
    }
}

/// Keyword classifier for confirmation answers
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    whole_word: bool,
}

impl Classifier {
    pub fn new(whole_word: bool) -> Self {
        Self { whole_word }
    }

    pub fn classify(&self, raw: &str) -> Verdict {
        let categories: [(&[&str], Verdict); 3] = [
            (&CONFIRM_WORDS, Verdict::Confirm),
            (&CANCEL_WORDS, Verdict::Cancel),
            (&REPEAT_WORDS, Verdict::Repeat),
        ];

        let text = if self.whole_word {
            padded_words(raw)
        } else {
            raw.to_lowercase()
        };

        categories
            .iter()
            .find(|(words, _)| words.iter().any(|w| self.contains(&text, w)))
            .map(|(_, verdict)| *verdict)
            .unwrap_or(Verdict::Unknown)
    }

    fn contains(&self, text: &str, keyword: &str) -> bool {
        if self.whole_word {
            text.contains(&format!(" {} ", keyword))
        } else {
            text.contains(keyword)
        }
    }
}

/// Substring classification with the default vocabulary
pub fn classify(raw: &str) -> Verdict {
    Classifier::default().classify(raw)
}

/// " word word " with punctuation stripped, so " no " only matches whole words
fn padded_words(raw: &str) -> String {
    let words: Vec<String> = raw
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();
    format!(" {} ", words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(classify("Yes"), Verdict::Confirm);
        assert_eq!(classify("okay do it"), Verdict::Confirm);
        assert_eq!(classify("nope"), Verdict::Cancel);
        assert_eq!(classify("Cancel that"), Verdict::Cancel);
        assert_eq!(classify("pardon?"), Verdict::Repeat);
        assert_eq!(classify("say again"), Verdict::Repeat);
        assert_eq!(classify("e four"), Verdict::Unknown);
        assert_eq!(classify(""), Verdict::Unknown);
    }

    #[test]
    fn test_confirm_wins_over_cancel() {
        assert_eq!(classify("no wait yes"), Verdict::Confirm);
        assert_eq!(classify("yes no"), Verdict::Confirm);
    }

    #[test]
    fn test_cancel_wins_over_repeat() {
        assert_eq!(classify("no, what"), Verdict::Cancel);
    }

    #[test]
    fn test_substring_matches_inside_words() {
        assert_eq!(classify("nonsense"), Verdict::Cancel);
        assert_eq!(classify("rook a one"), Verdict::Confirm);
        assert_eq!(classify("whatever"), Verdict::Repeat);
    }

    #[test]
    fn test_whole_word_mode() {
        let classifier = Classifier::new(true);
        assert_eq!(classifier.classify("nonsense"), Verdict::Unknown);
        assert_eq!(classifier.classify("rook a one"), Verdict::Unknown);
        assert_eq!(classifier.classify("No!"), Verdict::Cancel);
        assert_eq!(classifier.classify("please do it"), Verdict::Confirm);
        assert_eq!(classifier.classify("could you say, again?"), Verdict::Repeat);
        assert_eq!(classifier.classify("do"), Verdict::Unknown);
    }
}
