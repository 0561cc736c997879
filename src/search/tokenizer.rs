//! Prose tokenization for the TF-IDF index.

use std::sync::OnceLock;

use regex::Regex;

/// Tokens of this many characters or fewer are dropped.
pub const MIN_TOKEN_CHARS: usize = 2;

const STOP_WORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "because", "been", "before", "being",
    "both", "but", "can", "could", "did", "does", "each", "for", "from", "had", "has", "have",
    "her", "here", "his", "how", "into", "its", "just", "more", "most", "not", "now", "only",
    "other", "our", "out", "over", "same", "she", "should", "some", "such", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "too", "under", "very", "was", "were", "what", "when", "where", "which", "while", "who",
    "why", "will", "with", "would", "you", "your",
];

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("fence regex"))
}

fn disallowed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\-\s]").expect("token charset regex"))
}

/// Removes fenced code blocks.
pub fn strip_code_fences(text: &str) -> String {
    fence_regex().replace_all(text, " ").into_owned()
}

/// Whether `word` is on the stop list.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Lowercased index terms of `text`, in order, duplicates kept.
pub fn tokenize(text: &str) -> Vec<String> {
    let prose = strip_code_fences(text).to_lowercase();
    disallowed_regex()
        .replace_all(&prose, " ")
        .split_whitespace()
        .filter(|token| token.chars().count() > MIN_TOKEN_CHARS && !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// Lowercased alphanumeric words, for fuzzy matching and suggestions.
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric() && ch != '-')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}
