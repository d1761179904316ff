use crate::stopwords::StopWords;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

lazy_static! {
    static ref RE_WORD: Regex = Regex::new(r"\b[a-z]+\b").unwrap();
}

/// Common English function words used to score a text sample. The last few
/// entries are markup residue that survives tag stripping on english pages.
pub const ENGLISH_FUNCTION_WORDS: [&str; 67] = [
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "up",
    "about", "into", "through", "during", "before", "after", "above", "below", "between", "among",
    "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they", "what",
    "which", "who", "when", "where", "why", "how", "is", "are", "was", "were", "be", "have", "has",
    "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can",
    "a", "an", "br", "com", "www", "rol",
];

/// The language of the content to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    English,
    Other(String),
}

impl Language {
    pub fn identifier(&self) -> &str {
        match self {
            Language::English => "en",
            Language::Other(s) => s.as_str(),
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            Language::English => "English",
            Language::Other(s) => s.as_str(),
        }
    }

    /// Whether content in this language can be recognized and counted.
    pub fn is_supported(&self) -> bool {
        self.stopwords().is_some()
    }

    /// Get the stopwords for a language.
    pub fn stopwords(&self) -> Option<&'static StopWords> {
        StopWords::for_language(self)
    }
}

impl FromStr for Language {
    type Err = Language;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" => Ok(Language::English),
            s => Err(Language::Other(s.to_string())),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

/// Ratio test that decides whether a text looks like English.
///
/// This is a heuristic and not a classifier: the thresholds are permissive so
/// that jargon heavy pages still pass, false positives are expected.
#[derive(Debug, Clone, PartialEq)]
pub struct EnglishHeuristic {
    /// Texts with fewer (trimmed) chars are rejected.
    pub min_chars: usize,
    /// Number of leading chars that are inspected.
    pub sample_chars: usize,
    /// Samples with fewer alphabetic tokens are rejected.
    pub min_tokens: usize,
    /// Share of function words must be greater than this.
    pub min_english_ratio: f64,
    /// Share of non ascii chars must be lower than this.
    pub max_non_latin_ratio: f64,
}

impl EnglishHeuristic {
    pub const DEFAULT_MIN_CHARS: usize = 50;
    pub const DEFAULT_SAMPLE_CHARS: usize = 1_000;
    pub const DEFAULT_MIN_TOKENS: usize = 10;
    pub const DEFAULT_MIN_ENGLISH_RATIO: f64 = 0.1;
    pub const DEFAULT_MAX_NON_LATIN_RATIO: f64 = 0.1;

    pub fn is_english(&self, text: &str) -> bool {
        if text.trim().chars().count() < self.min_chars {
            return false;
        }

        let sample: String = text
            .chars()
            .take(self.sample_chars)
            .collect::<String>()
            .to_lowercase();

        let (token_count, english_count) =
            RE_WORD
                .find_iter(&sample)
                .fold((0usize, 0usize), |(tokens, english), m| {
                    if ENGLISH_FUNCTION_WORDS.contains(&m.as_str()) {
                        (tokens + 1, english + 1)
                    } else {
                        (tokens + 1, english)
                    }
                });

        if token_count < self.min_tokens {
            return false;
        }

        let (sample_len, non_latin) = sample
            .chars()
            .fold((0usize, 0usize), |(len, non_latin), c| {
                (len + 1, non_latin + (!c.is_ascii()) as usize)
            });

        let english_ratio = english_count as f64 / token_count as f64;
        let non_latin_ratio = if sample_len > 0 {
            non_latin as f64 / sample_len as f64
        } else {
            1.0
        };

        english_ratio > self.min_english_ratio && non_latin_ratio < self.max_non_latin_ratio
    }
}

impl Default for EnglishHeuristic {
    fn default() -> Self {
        Self {
            min_chars: Self::DEFAULT_MIN_CHARS,
            sample_chars: Self::DEFAULT_SAMPLE_CHARS,
            min_tokens: Self::DEFAULT_MIN_TOKENS,
            min_english_ratio: Self::DEFAULT_MIN_ENGLISH_RATIO,
            max_non_latin_ratio: Self::DEFAULT_MAX_NON_LATIN_RATIO,
        }
    }
}
