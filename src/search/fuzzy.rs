//! Edit-distance matching used as a secondary ranking signal.

use super::tokenizer::words;

/// Query words shorter than this are ignored.
pub const MIN_QUERY_WORD: usize = 3;
/// Largest edit distance that still counts as a match.
pub const MAX_EDIT_DISTANCE: usize = 2;
/// Characters of content considered besides the title.
pub const CONTENT_WINDOW: usize = 500;

/// Levenshtein distance over a full dynamic-programming table.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        table[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            table[i][j] = (table[i - 1][j] + 1)
                .min(table[i][j - 1] + 1)
                .min(table[i - 1][j - 1] + cost);
        }
    }
    table[a.len()][b.len()]
}

fn matches(query_word: &str, candidate: &str) -> bool {
    candidate == query_word
        || candidate.starts_with(query_word)
        || levenshtein(query_word, candidate) <= MAX_EDIT_DISTANCE
}

/// Fraction of query words (3+ chars) found in the title or the start of the content.
pub fn fuzzy_score(query: &str, title: &str, content: &str) -> f64 {
    let query_words: Vec<String> = words(query)
        .into_iter()
        .filter(|word| word.chars().count() >= MIN_QUERY_WORD)
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }

    let window: String = content.chars().take(CONTENT_WINDOW).collect();
    let mut haystack = words(title);
    haystack.extend(words(&window));

    let found = query_words
        .iter()
        .filter(|query_word| haystack.iter().any(|word| matches(query_word, word)))
        .count();
    found as f64 / query_words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("auth", ""), 4);
        assert_eq!(levenshtein("webhook", "webhooks"), 1);
    }

    #[test]
    fn typos_prefixes_and_misses() {
        assert_eq!(fuzzy_score("authentcation", "Authentication", ""), 1.0);
        assert_eq!(fuzzy_score("auth", "Authentication", ""), 1.0);
        assert_eq!(
            fuzzy_score("webhook billing", "Webhooks", "Receive events"),
            0.5
        );
        assert_eq!(fuzzy_score("an", "Anything", ""), 0.0);
    }
}
