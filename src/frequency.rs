use std::iter::FromIterator;

use fnv::FnvHashMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::document::Document;
use crate::text::TermExtractor;

/// A term and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: u64,
}

impl TermCount {
    pub fn new<T: ToString>(term: T, count: u64) -> Self {
        Self {
            term: term.to_string(),
            count,
        }
    }
}

/// Occurrence counts per term.
///
/// Terms are kept in the order they were first counted, this order breaks
/// ties when ranking. Two tables are equal if they hold the same counts,
/// regardless of that order.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    index: FnvHashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of the term.
    #[inline]
    pub fn add(&mut self, term: &str) {
        self.add_count(term, 1)
    }

    pub fn add_count(&mut self, term: &str, count: u64) {
        if let Some(idx) = self.index.get(term) {
            self.entries[*idx].1 += count;
        } else {
            self.insert_new(term.to_string(), count);
        }
    }

    fn insert_new(&mut self, term: String, count: u64) {
        self.index.insert(term.clone(), self.entries.len());
        self.entries.push((term, count));
    }

    pub fn get(&self, term: &str) -> Option<u64> {
        self.index.get(term).map(|idx| self.entries[*idx].1)
    }

    /// Number of distinct terms.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// All terms and their counts in first seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(t, c)| (t.as_str(), *c))
    }

    /// Add all counts of the other table to this one.
    pub fn merge(&mut self, other: FrequencyTable) {
        for (term, count) in other.entries {
            if let Some(idx) = self.index.get(&term) {
                self.entries[*idx].1 += count;
            } else {
                self.insert_new(term, count);
            }
        }
    }

    /// The `n` most frequent terms, highest count first.
    ///
    /// Purely numeric terms and terms that occurred only once are skipped,
    /// terms with equal counts keep their first seen order.
    pub fn top_terms(&self, n: usize) -> Vec<TermCount> {
        let mut eligible: Vec<_> = self
            .entries
            .iter()
            .filter(|(term, count)| *count > 1 && !is_numeric(term))
            .collect();
        eligible.sort_by(|a, b| b.1.cmp(&a.1));
        eligible
            .into_iter()
            .take(n)
            .map(|(term, count)| TermCount::new(term, *count))
            .collect()
    }
}

fn is_numeric(term: &str) -> bool {
    !term.is_empty() && term.chars().all(|c| c.is_numeric())
}

impl PartialEq for FrequencyTable {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(t, c)| other.get(t) == Some(c))
    }
}

impl Eq for FrequencyTable {}

impl<T: AsRef<str>> Extend<T> for FrequencyTable {
    fn extend<I: IntoIterator<Item = T>>(&mut self, terms: I) {
        for term in terms {
            self.add(term.as_ref());
        }
    }
}

impl<T: AsRef<str>> FromIterator<(T, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (T, u64)>>(iter: I) -> Self {
        let mut table = FrequencyTable::new();
        for (term, count) in iter {
            table.add_count(term.as_ref(), count);
        }
        table
    }
}

impl Serialize for FrequencyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (term, count) in self.iter() {
            map.serialize_entry(term, &count)?;
        }
        map.end()
    }
}

/// Counts terms over documents, fanning out to a worker pool for larger sets.
#[derive(Debug)]
pub struct FrequencyAggregator {
    extractor: TermExtractor,
    parallel_threshold: usize,
    workers: usize,
    pool: Option<ThreadPool>,
}

impl FrequencyAggregator {
    /// Document count above which the worker pool is used.
    pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10;

    /// Upper bound for the default number of workers.
    pub const MAX_DEFAULT_WORKERS: usize = 4;

    /// Sequential aggregation only.
    pub fn sequential(extractor: TermExtractor) -> Self {
        Self {
            extractor,
            parallel_threshold: Self::DEFAULT_PARALLEL_THRESHOLD,
            workers: 1,
            pool: None,
        }
    }

    /// Aggregate with a pool of `workers` threads once more than
    /// `parallel_threshold` documents have content.
    ///
    /// Falls back to sequential aggregation if the pool can't be created.
    pub fn parallel(extractor: TermExtractor, workers: usize, parallel_threshold: usize) -> Self {
        let workers = workers.max(1);
        let pool = if workers > 1 {
            match ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("term-worker-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!("Failed to start term workers, counting sequentially: {}", err);
                    None
                }
            }
        } else {
            None
        };

        Self {
            extractor,
            parallel_threshold,
            workers,
            pool,
        }
    }

    /// Default number of workers for this machine.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(Self::MAX_DEFAULT_WORKERS)
    }

    #[inline]
    pub fn extractor(&self) -> &TermExtractor {
        &self.extractor
    }

    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Count the terms of all documents that have content.
    pub fn aggregate_documents(&self, documents: &[Document]) -> FrequencyTable {
        let with_content: Vec<&Document> = documents.iter().filter(|d| d.has_content()).collect();
        info!(
            "Counting terms of {} documents, {} with content",
            documents.len(),
            with_content.len()
        );

        if with_content.is_empty() {
            return FrequencyTable::new();
        }

        let frequencies = match &self.pool {
            Some(pool) if with_content.len() > self.parallel_threshold => {
                self.aggregate_parallel(pool, &with_content)
            }
            _ => {
                debug!("Counting terms sequentially");
                self.count_batch(with_content.iter().copied())
            }
        };

        info!("Found {} unique terms", frequencies.len());
        frequencies
    }

    /// Count the terms of a single text.
    pub fn aggregate_text(&self, text: &str) -> FrequencyTable {
        let mut frequencies = FrequencyTable::new();
        frequencies.extend(self.extractor.extract_terms(text));
        frequencies
    }

    /// Count the terms of a batch of documents into a fresh table.
    pub fn count_batch<'a, I>(&self, documents: I) -> FrequencyTable
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut frequencies = FrequencyTable::new();
        for doc in documents.into_iter().filter(|d| d.has_content()) {
            frequencies.extend(self.extractor.extract_terms(doc.text()));
        }
        frequencies
    }

    fn aggregate_parallel(&self, pool: &ThreadPool, documents: &[&Document]) -> FrequencyTable {
        let batch_size = (documents.len() + self.workers - 1) / self.workers;
        debug!(
            "Counting terms with {} workers in batches of {}",
            self.workers, batch_size
        );

        pool.install(|| {
            documents
                .par_chunks(batch_size)
                .map(|batch| self.count_batch(batch.iter().copied()))
                .reduce(FrequencyTable::new, |mut acc, partial| {
                    acc.merge(partial);
                    acc
                })
        })
    }
}

impl Default for FrequencyAggregator {
    fn default() -> Self {
        FrequencyAggregator::parallel(
            TermExtractor::default(),
            FrequencyAggregator::default_workers(),
            FrequencyAggregator::DEFAULT_PARALLEL_THRESHOLD,
        )
    }
}
