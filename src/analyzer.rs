use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::archive::{ArchiveClient, HttpTransport, RequestStats, Transport};
use crate::cdx::{QueryParameters, DEFAULT_DOMAIN_COUNT, POPULAR_DOMAINS};
use crate::document::Document;
use crate::error::ArchiveError;
use crate::frequency::FrequencyAggregator;
use crate::language::{EnglishHeuristic, Language};
use crate::report::{AnalysisOutcome, AnalysisReport};
use crate::session::{Phase, Session};
use crate::text::{CacheStats, TermExtractor};

/// Runs term frequency analyses over archived web pages.
///
/// Every call of [`Analyzer::analyze_period`] uses a fresh [`ArchiveClient`],
/// the term cache of the analyzer is shared by all runs.
pub struct Analyzer<T = HttpTransport> {
    transport: T,
    config: Config,
    aggregator: FrequencyAggregator,
    last_stats: RequestStats,
}

impl Analyzer<HttpTransport> {
    /// Create an analyzer that talks to the archive over http.
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.browser_user_agent, config.request_timeout)
            .context("Failed to create the archive transport.")?;
        Ok(Self::with_transport(transport, config))
    }

    /// Convenience method to create a [`ConfigBuilder`]
    #[inline]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

impl<T: Transport + Clone> Analyzer<T> {
    pub fn with_transport(transport: T, config: Config) -> Self {
        let extractor = TermExtractor::new(config.min_term_len, config.term_cache_capacity);
        let aggregator = if config.parallel {
            FrequencyAggregator::parallel(extractor, config.max_workers, config.parallel_threshold)
        } else {
            FrequencyAggregator::sequential(extractor)
        };
        Self {
            transport,
            config,
            aggregator,
            last_stats: RequestStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Request counters of the last run.
    pub fn stats(&self) -> RequestStats {
        self.last_stats
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.aggregator.extractor().cache_stats()
    }

    /// Find, download and count the terms of archived pages of a period.
    ///
    /// Failures of single requests or documents are skipped, the run only
    /// fails if the request is invalid or nothing could be found.
    pub async fn analyze_period(&mut self, request: AnalysisRequest) -> AnalysisOutcome {
        info!(
            "Starting analysis of {} to {} for at most {} documents",
            request.start_year, request.end_year, request.max_documents
        );
        let mut session = Session::new();
        let mut client = ArchiveClient::new(self.transport.clone(), self.config.clone());

        let result = self.run(&request, &mut client, &mut session).await;
        self.last_stats = client.stats();

        match result {
            Ok(()) => {
                session.advance(Phase::Done);
                let report = AnalysisReport::from_session(session);
                info!(
                    "Analysis finished: {} documents, {} unique terms",
                    report.summary.total_documents, report.summary.total_unique_terms
                );
                AnalysisOutcome::Completed(Box::new(report))
            }
            Err(err) => {
                session.advance(Phase::Failed);
                error!("Analysis failed: {:#}", err);
                AnalysisOutcome::failed(format!("{:#}", err))
            }
        }
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        client: &mut ArchiveClient<T>,
        session: &mut Session,
    ) -> Result<()> {
        request.validate()?;

        let params = request.query_parameters();
        let documents = client
            .plan_and_fetch_candidates(&params, params.max_results)
            .await;
        if documents.is_empty() {
            return Err(ArchiveError::NoCandidates.into());
        }
        session.set_documents(documents);

        session.advance(Phase::Fetching);
        download_content(client, session.documents_mut()).await;

        session.advance(Phase::Aggregating);
        let frequencies = self.aggregator.aggregate_documents(session.documents());
        let top_terms = frequencies.top_terms(self.config.top_n);
        session.set_frequencies(frequencies);
        session.set_top_terms(top_terms);

        session.advance(Phase::Summarizing);
        session.set_request_stats(client.stats());
        let summary = session.summary();
        info!(
            "{} of {} documents with content, {} unique terms, success rate {:.1}%",
            summary.documents_with_content,
            summary.total_documents,
            summary.total_unique_terms,
            client.stats().success_rate
        );
        Ok(())
    }
}

/// Download the content of every document, one after another.
async fn download_content<T: Transport>(client: &mut ArchiveClient<T>, documents: &mut [Document]) {
    let total = documents.len();
    let mut successful = 0;
    for (idx, document) in documents.iter_mut().enumerate() {
        debug!(
            "Downloading {}/{}: {}",
            idx + 1,
            total,
            document.provenance.original_url
        );
        let content = client.fetch_text(document).await;
        if content.is_empty() {
            warn!("No usable content for {}", document.identifier);
        } else {
            document.set_content(content);
            successful += 1;
        }
        if (idx + 1) % 10 == 0 {
            info!("Progress: {}/{} pages processed", idx + 1, total);
        }
    }
    info!("Download finished: {}/{} successful", successful, total);
}

/// The period and sources of an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub start_year: i32,
    pub end_year: i32,
    pub max_documents: usize,
    /// Domains to search, the configured defaults if empty.
    pub domains: Vec<String>,
    /// Words that must appear in the url of a page.
    pub search_terms: Vec<String>,
    /// Language of the content to keep.
    pub language: Language,
}

impl AnalysisRequest {
    pub const DEFAULT_MAX_DOCUMENTS: usize = 600;

    pub fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
            max_documents: Self::DEFAULT_MAX_DOCUMENTS,
            domains: Vec::new(),
            search_terms: Vec::new(),
            language: Language::default(),
        }
    }

    pub fn max_documents(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents;
        self
    }

    pub fn domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.domains = domains.into_iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn search_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.search_terms = terms.into_iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ArchiveError> {
        if self.start_year > self.end_year {
            return Err(ArchiveError::InvalidYearRange {
                start_year: self.start_year,
                end_year: self.end_year,
            });
        }
        if !self.language.is_supported() {
            return Err(ArchiveError::UnsupportedLanguage(self.language.clone()));
        }
        Ok(())
    }

    pub fn query_parameters(&self) -> QueryParameters {
        QueryParameters::new(self.start_year, self.end_year, self.max_documents)
            .domains(&self.domains)
            .search_terms(&self.search_terms)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Pause after rate limit responses and between domains.
    pub(crate) rate_limit_delay: Duration,
    /// Minimum time between two requests.
    pub(crate) min_request_interval: Duration,
    /// Timeout for index queries.
    pub(crate) request_timeout: Duration,
    /// Timeout for snapshot downloads.
    pub(crate) snapshot_timeout: Duration,
    /// How often a rate limited request is retried.
    pub(crate) max_rate_limit_retries: u32,
    /// The user-agent used for requests.
    pub(crate) browser_user_agent: String,
    pub(crate) cdx_endpoint: String,
    /// Prefix of snapshot urls.
    pub(crate) wayback_base: String,
    /// Domains searched if a request names none.
    pub(crate) default_domains: Vec<String>,
    /// Max. number of records per index page.
    pub(crate) page_size: usize,
    pub(crate) max_pages_per_dimension: usize,
    /// Decides whether downloaded text is kept.
    pub(crate) english: EnglishHeuristic,
    /// Min. number of chars of a term.
    pub(crate) min_term_len: usize,
    /// Number of texts whose terms are cached, 0 disables the cache.
    pub(crate) term_cache_capacity: usize,
    /// Whether to count terms on a worker pool.
    pub(crate) parallel: bool,
    pub(crate) parallel_threshold: usize,
    pub(crate) max_workers: usize,
    /// Number of top terms in a report.
    pub(crate) top_n: usize,
}

impl Config {
    pub const DEFAULT_RATE_LIMIT_DELAY_SEC: u64 = 4;

    pub const DEFAULT_MIN_REQUEST_INTERVAL_SEC: u64 = 1;

    /// Default timeout for requests to the archive.
    pub const DEFAULT_REQ_TIMEOUT_SEC: u64 = 30;

    pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 3;

    pub const DEFAULT_CDX_ENDPOINT: &'static str = "http://web.archive.org/cdx/search/cdx";

    pub const DEFAULT_WAYBACK_BASE: &'static str = "http://web.archive.org/web/";

    pub const DEFAULT_PAGE_SIZE: usize = 500;

    pub const DEFAULT_MAX_PAGES: usize = 10;

    pub const DEFAULT_TOP_N: usize = 100;

    /// Default user agent for `wayback-terms`.
    #[inline]
    pub(crate) fn user_agent() -> String {
        format!(
            "wayback-terms/{} (Educational Research Project)",
            env!("CARGO_PKG_VERSION")
        )
    }

    /// Convenience method to create a [`ConfigBuilder`]
    #[inline]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    #[inline]
    pub fn browser_user_agent(&self) -> &str {
        &self.browser_user_agent
    }

    #[inline]
    pub fn default_domains(&self) -> &[String] {
        &self.default_domains
    }

    #[inline]
    pub fn top_n(&self) -> usize {
        self.top_n
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    rate_limit_delay: Option<Duration>,
    min_request_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    snapshot_timeout: Option<Duration>,
    max_rate_limit_retries: Option<u32>,
    browser_user_agent: Option<String>,
    cdx_endpoint: Option<String>,
    wayback_base: Option<String>,
    default_domains: Option<Vec<String>>,
    page_size: Option<usize>,
    max_pages_per_dimension: Option<usize>,
    english: Option<EnglishHeuristic>,
    min_term_len: Option<usize>,
    term_cache_capacity: Option<usize>,
    parallel: Option<bool>,
    parallel_threshold: Option<usize>,
    max_workers: Option<usize>,
    top_n: Option<usize>,
}

impl ConfigBuilder {
    pub fn rate_limit_delay(mut self, rate_limit_delay: Duration) -> Self {
        self.rate_limit_delay = Some(rate_limit_delay);
        self
    }

    pub fn min_request_interval(mut self, min_request_interval: Duration) -> Self {
        self.min_request_interval = Some(min_request_interval);
        self
    }

    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    pub fn snapshot_timeout(mut self, snapshot_timeout: Duration) -> Self {
        self.snapshot_timeout = Some(snapshot_timeout);
        self
    }

    pub fn max_rate_limit_retries(mut self, max_rate_limit_retries: u32) -> Self {
        self.max_rate_limit_retries = Some(max_rate_limit_retries);
        self
    }

    pub fn browser_user_agent<T: ToString>(mut self, browser_user_agent: T) -> Self {
        self.browser_user_agent = Some(browser_user_agent.to_string());
        self
    }

    pub fn cdx_endpoint<T: ToString>(mut self, cdx_endpoint: T) -> Self {
        self.cdx_endpoint = Some(cdx_endpoint.to_string());
        self
    }

    pub fn wayback_base<T: ToString>(mut self, wayback_base: T) -> Self {
        self.wayback_base = Some(wayback_base.to_string());
        self
    }

    pub fn default_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.default_domains = Some(domains.into_iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn max_pages_per_dimension(mut self, max_pages_per_dimension: usize) -> Self {
        self.max_pages_per_dimension = Some(max_pages_per_dimension);
        self
    }

    pub fn english(mut self, english: EnglishHeuristic) -> Self {
        self.english = Some(english);
        self
    }

    pub fn min_term_len(mut self, min_term_len: usize) -> Self {
        self.min_term_len = Some(min_term_len);
        self
    }

    /// Count only terms with at least three chars.
    pub fn simple_profile(self) -> Self {
        self.min_term_len(3)
    }

    pub fn term_cache_capacity(mut self, term_cache_capacity: usize) -> Self {
        self.term_cache_capacity = Some(term_cache_capacity);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = Some(parallel_threshold);
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn build(self) -> Config {
        Config {
            rate_limit_delay: self
                .rate_limit_delay
                .unwrap_or_else(|| Duration::from_secs(Config::DEFAULT_RATE_LIMIT_DELAY_SEC)),
            min_request_interval: self.min_request_interval.unwrap_or_else(|| {
                Duration::from_secs(Config::DEFAULT_MIN_REQUEST_INTERVAL_SEC)
            }),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(Config::DEFAULT_REQ_TIMEOUT_SEC)),
            snapshot_timeout: self
                .snapshot_timeout
                .unwrap_or_else(|| Duration::from_secs(Config::DEFAULT_REQ_TIMEOUT_SEC)),
            max_rate_limit_retries: self
                .max_rate_limit_retries
                .unwrap_or(Config::DEFAULT_MAX_RATE_LIMIT_RETRIES),
            browser_user_agent: self
                .browser_user_agent
                .unwrap_or_else(Config::user_agent),
            cdx_endpoint: self
                .cdx_endpoint
                .unwrap_or_else(|| Config::DEFAULT_CDX_ENDPOINT.to_string()),
            wayback_base: self
                .wayback_base
                .unwrap_or_else(|| Config::DEFAULT_WAYBACK_BASE.to_string()),
            default_domains: self.default_domains.unwrap_or_else(|| {
                POPULAR_DOMAINS[..DEFAULT_DOMAIN_COUNT]
                    .iter()
                    .map(|d| d.to_string())
                    .collect()
            }),
            page_size: self.page_size.unwrap_or(Config::DEFAULT_PAGE_SIZE).max(1),
            max_pages_per_dimension: self
                .max_pages_per_dimension
                .unwrap_or(Config::DEFAULT_MAX_PAGES),
            english: self.english.unwrap_or_default(),
            min_term_len: self
                .min_term_len
                .unwrap_or(TermExtractor::DEFAULT_MIN_TERM_LEN),
            term_cache_capacity: self
                .term_cache_capacity
                .unwrap_or(TermExtractor::DEFAULT_CACHE_CAPACITY),
            parallel: self.parallel.unwrap_or(true),
            parallel_threshold: self
                .parallel_threshold
                .unwrap_or(FrequencyAggregator::DEFAULT_PARALLEL_THRESHOLD),
            max_workers: self
                .max_workers
                .unwrap_or_else(FrequencyAggregator::default_workers),
            top_n: self.top_n.unwrap_or(Config::DEFAULT_TOP_N),
        }
    }
}
