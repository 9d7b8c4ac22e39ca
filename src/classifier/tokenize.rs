//! Text → tokens for the bag-of-words backend.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{Han}+)|([\p{L}\p{N}&&[^\p{Han}]]+)").expect("token pattern is valid")
});

/// Lowercased words for alphabetic scripts; character unigrams plus bigrams
/// for runs of Han characters, which carry no word boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for captures in TOKEN_REGEX.captures_iter(text) {
        if let Some(han) = captures.get(1) {
            let chars: Vec<char> = han.as_str().chars().collect();
            tokens.extend(chars.iter().map(|c| c.to_string()));
            tokens.extend(chars.windows(2).map(|pair| pair.iter().collect::<String>()));
        } else if let Some(word) = captures.get(2) {
            tokens.push(word.as_str().to_lowercase());
        }
    }
    tokens
}
