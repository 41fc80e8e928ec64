//! Keyword extraction shared by the connection graph and the pattern detector.
//!
//! Both consumers must score text identically, so there is exactly one
//! tokenizer and one similarity formula.

// Allow cast_precision_loss for keyword counts converted to f32 scores.
#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;
use std::sync::LazyLock;

/// Minimum length (in characters) of a keyword.
pub const MIN_KEYWORD_LENGTH: usize = 4;

/// Characters that separate tokens.
const DELIMITERS: &[char] = &[
    ' ', '\t', '\n', '\r', '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '"', '\'',
];

/// Words ignored by keyword extraction.
pub static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "this", "that", "these", "those", "with", "from", "have", "has", "been", "will",
        "would", "could", "should", "what", "when", "where", "which", "while", "your", "their",
        "there", "here",
    ]
    .into_iter()
    .collect()
});

/// Deduplicated, lowercase keywords of a text, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    words: Vec<String>,
    index: HashSet<String>,
}

impl KeywordSet {
    /// Extracts keywords from `text`.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut set = Self::default();
        for token in text.split(DELIMITERS) {
            if token.chars().count() < MIN_KEYWORD_LENGTH {
                continue;
            }
            let word = token.to_lowercase();
            if STOP_WORDS.contains(word.as_str()) || set.index.contains(&word) {
                continue;
            }
            set.index.insert(word.clone());
            set.words.push(word);
        }
        set
    }

    /// Returns the keywords in first-occurrence order.
    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Number of keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if the text produced no keywords.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns true if `word` is one of the keywords.
    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(word)
    }

    /// Number of keywords present in both sets.
    #[must_use]
    pub fn shared_with(&self, other: &Self) -> usize {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.words.iter().filter(|w| large.contains(w)).count()
    }

    /// Shared keywords divided by the larger set size.
    ///
    /// Returns 0.0 if either set is empty.
    #[must_use]
    pub fn similarity(&self, other: &Self) -> f32 {
        let max = self.len().max(other.len());
        if self.is_empty() || other.is_empty() {
            return 0.0;
        }
        self.shared_with(other) as f32 / max as f32
    }
}

/// Extracts keywords from `text`.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    KeywordSet::from_text(text).words
}

/// Keyword similarity of two texts, in 0.0..=1.0.
#[must_use]
pub fn keyword_similarity(a: &str, b: &str) -> f32 {
    KeywordSet::from_text(a).similarity(&KeywordSet::from_text(b))
}
