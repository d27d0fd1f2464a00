//! Phrase normalization - turns a raw transcript into move tokens
//!
//! Speech recognizers hand back text like "Knight, F-three!" or "e four.".
//! Everything downstream works on lowercase alphanumeric tokens with spelled
//! numbers already mapped to digits.

const NUMBER_WORDS: [(&str, &str); 8] = [
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
];

/// Lowercase, hyphens to spaces, collapse whitespace, trim.
///
/// Punctuation other than hyphens survives here; castling and the literal
/// fallback both read this form before tokens are cut.
pub fn clean(raw: &str) -> String {
    raw.to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a transcript into normalized tokens. Never fails.
pub fn normalize(raw: &str) -> Vec<String> {
    tokenize(&clean(raw))
}

/// Tokenize an already cleaned string
pub fn tokenize(cleaned: &str) -> Vec<String> {
    cleaned
        .split(' ')
        .filter_map(|word| {
            let word: String = word
                .chars()
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                .collect();
            if word.is_empty() {
                return None;
            }
            Some(number_digit(&word).map(String::from).unwrap_or(word))
        })
        .collect()
}

/// Digit for a spelled-out number word, one through eight
pub fn number_digit(word: &str) -> Option<&'static str> {
    NUMBER_WORDS
        .iter()
        .find(|(spelled, _)| *spelled == word)
        .map(|(_, digit)| *digit)
}
