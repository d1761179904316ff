use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use fnv::FnvHasher;
use lazy_static::lazy_static;
use lru::LruCache;
use regex::Regex;
use serde::Serialize;

use crate::stopwords::{StopWords, ENGLISH_STOPWORDS};

pub const PUNCTUATION: &str = r###"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"###;

lazy_static! {
    static ref RE_ALPHA_RUN: Regex = Regex::new(r"\b[a-z]+\b").unwrap();
}

/// Whether the char is a punctuation.
pub fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(c)
}

/// Lowercase the text, replace punctuation with spaces and collapse runs of
/// whitespace into a single space.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for word in lowered
        .split(|c: char| c.is_whitespace() || is_punctuation(c))
        .filter(|s| !s.is_empty())
    {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Hit and miss counters of the term cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate_percent: f64,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    hash: u64,
    len: usize,
}

impl CacheKey {
    fn new(text: &str) -> Self {
        let mut hasher = FnvHasher::default();
        hasher.write(text.as_bytes());
        Self {
            hash: hasher.finish(),
            len: text.len(),
        }
    }
}

/// Turns text into the sequence of countable terms.
///
/// The extractor is shared between aggregation workers, the cache is guarded
/// by a mutex and the counters are atomics.
#[derive(Debug)]
pub struct TermExtractor {
    min_term_len: usize,
    stopwords: &'static StopWords,
    cache: Option<Mutex<LruCache<CacheKey, Vec<String>>>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl TermExtractor {
    pub const DEFAULT_MIN_TERM_LEN: usize = 2;

    pub const DEFAULT_CACHE_CAPACITY: usize = 500;

    pub fn new(min_term_len: usize, cache_capacity: usize) -> Self {
        Self::with_stopwords(min_term_len, cache_capacity, &ENGLISH_STOPWORDS)
    }

    pub fn with_stopwords(
        min_term_len: usize,
        cache_capacity: usize,
        stopwords: &'static StopWords,
    ) -> Self {
        Self {
            min_term_len: min_term_len.max(1),
            stopwords,
            cache: NonZeroUsize::new(cache_capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn min_term_len(&self) -> usize {
        self.min_term_len
    }

    /// Extract the terms of the text in order of appearance.
    ///
    /// Duplicates are kept, stop words and tokens shorter than the configured
    /// minimum length are dropped.
    pub fn extract_terms(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let key = CacheKey::new(text);
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                if let Some(terms) = cache.get(&key) {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    return terms.clone();
                }
            }
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let terms = self.tokenize(&normalize(text));

        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                cache.put(key, terms.clone());
            }
        }
        terms
    }

    fn tokenize(&self, normalized: &str) -> Vec<String> {
        RE_ALPHA_RUN
            .find_iter(normalized)
            .map(|m| m.as_str())
            .filter(|word| word.len() >= self.min_term_len && !self.stopwords.is_stopword(word))
            .map(str::to_string)
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let total = cache_hits + cache_misses;
        let hit_rate_percent = if total > 0 {
            (cache_hits as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        let cache_size = self
            .cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.len()))
            .unwrap_or_default();

        CacheStats {
            cache_hits,
            cache_misses,
            hit_rate_percent,
            cache_size,
        }
    }
}

impl Default for TermExtractor {
    fn default() -> Self {
        TermExtractor::new(Self::DEFAULT_MIN_TERM_LEN, Self::DEFAULT_CACHE_CAPACITY)
    }
}
