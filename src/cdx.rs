//! Candidate discovery through the archive's CDX index.

use fnv::FnvHashSet;
use log::{debug, error, info, warn};
use url::Url;

use crate::archive::{ArchiveClient, Transport};
use crate::date::SnapshotTimestamp;
use crate::document::{Document, Provenance};
use crate::error::ArchiveError;

/// News sites with a long capture history.
pub const POPULAR_DOMAINS: [&str; 20] = [
    "cnn.com",
    "bbc.co.uk",
    "nytimes.com",
    "washingtonpost.com",
    "reuters.com",
    "theguardian.com",
    "wsj.com",
    "usatoday.com",
    "latimes.com",
    "npr.org",
    "abcnews.go.com",
    "cbsnews.com",
    "nbcnews.com",
    "foxnews.com",
    "time.com",
    "newsweek.com",
    "bloomberg.com",
    "forbes.com",
    "economist.com",
    "apnews.com",
];

/// Number of [`POPULAR_DOMAINS`] searched when a request names no domains.
pub const DEFAULT_DOMAIN_COUNT: usize = 5;

/// Urls ending with one of these never point to an html page.
pub const EXCLUDED_EXTENSIONS: [&str; 13] = [
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".ico", ".pdf", ".css", ".js", ".json", ".xml",
    ".rss", ".atom",
];

/// Fields requested from the index, in this order.
pub const CDX_FIELDS: &str = "timestamp,original,mimetype,statuscode,digest,length";

/// Label of documents found through the index.
pub const CDX_SOURCE_API: &str = "cdx";

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pub start_year: i32,
    pub end_year: i32,
    /// Domains to search, the configured defaults are used if empty.
    pub domains: Vec<String>,
    /// Optional words that must appear in the url of a capture.
    pub search_terms: Vec<String>,
    pub max_results: usize,
}

impl QueryParameters {
    pub fn new(start_year: i32, end_year: i32, max_results: usize) -> Self {
        Self {
            start_year,
            end_year,
            domains: Vec::new(),
            search_terms: Vec::new(),
            max_results,
        }
    }

    pub fn domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.domains = domains
            .into_iter()
            .map(|d| normalize_domain(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    pub fn search_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.search_terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    #[inline]
    pub fn contains_year(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    /// The index filter that restricts captures to urls containing any of
    /// the search terms.
    pub fn url_filter(&self) -> Option<String> {
        if self.search_terms.is_empty() {
            return None;
        }
        let alternatives = self
            .search_terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        Some(format!("original:.*({}).*", alternatives))
    }
}

/// Strip scheme and trailing slashes of a user supplied domain.
fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim();
    let domain = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain);
    domain.trim_end_matches('/').to_lowercase()
}

/// Split `cap` into `n` quotas that differ by at most one, the first
/// `cap % n` quotas get the extra one.
pub fn split_evenly(cap: usize, n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let (base, extra) = (cap / n, cap % n);
    (0..n).map(|i| base + usize::from(i < extra)).collect()
}

/// A single capture listed by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxRecord {
    pub timestamp: String,
    pub original: String,
    pub mimetype: String,
    pub statuscode: String,
    pub digest: String,
    pub length: String,
}

impl CdxRecord {
    /// Read a row with the fields of [`CDX_FIELDS`], shorter rows are
    /// rejected.
    pub fn from_row(row: &[String]) -> Option<Self> {
        match row {
            [timestamp, original, mimetype, statuscode, digest, length, ..] => Some(Self {
                timestamp: timestamp.clone(),
                original: original.clone(),
                mimetype: mimetype.clone(),
                statuscode: statuscode.clone(),
                digest: digest.clone(),
                length: length.clone(),
            }),
            _ => None,
        }
    }

    #[inline]
    pub fn is_html(&self) -> bool {
        self.mimetype.to_lowercase().contains("html")
    }

    /// The url of the archived snapshot.
    pub fn wayback_url(&self, wayback_base: &str) -> String {
        format!("{}{}/{}", wayback_base, self.timestamp, self.original)
    }

    pub fn into_document(self, wayback_base: &str) -> Document {
        let wayback_url = self.wayback_url(wayback_base);
        let date = SnapshotTimestamp::parse(&self.timestamp);
        let year = SnapshotTimestamp::year(&self.timestamp);
        Document::new(
            format!("{}_{}", self.digest, self.timestamp),
            Document::title_from_url(&self.original),
            date,
            year,
        )
        .with_provenance(Provenance {
            original_url: self.original,
            wayback_url,
            mimetype: self.mimetype,
            digest: self.digest,
            source_api: CDX_SOURCE_API.to_string(),
        })
    }
}

/// One page of index results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdxPage {
    pub records: Vec<CdxRecord>,
    /// Key to request the next page with, if there is one.
    pub resume_key: Option<String>,
}

impl CdxPage {
    /// Parse the json output of the index.
    ///
    /// The first row holds the field names, an empty row separates the
    /// records from the resume key.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        let rows: Vec<Vec<String>> = serde_json::from_str(body)?;
        let mut page = Self::default();
        let mut rows = rows.into_iter().peekable();

        if let Some(header) = rows.peek() {
            if header.first().map(String::as_str) == Some("timestamp") {
                rows.next();
            }
        }

        while let Some(row) = rows.next() {
            if row.is_empty() {
                page.resume_key = rows
                    .next()
                    .and_then(|r| r.into_iter().next())
                    .filter(|k| !k.is_empty());
                break;
            }
            match CdxRecord::from_row(&row) {
                Some(record) => page.records.push(record),
                None => debug!("Skipping short index row {:?}", row),
            }
        }
        Ok(page)
    }
}

/// Build the index query for a single domain.
pub fn cdx_query_url(
    endpoint: &str,
    domain: &str,
    params: &QueryParameters,
    limit: usize,
    resume_key: Option<&str>,
) -> Result<Url, ArchiveError> {
    let mut url = Url::parse(endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("url", &format!("{}/*", domain))
            .append_pair("from", &format!("{}0101", params.start_year))
            .append_pair("to", &format!("{}1231", params.end_year))
            .append_pair("output", "json")
            .append_pair("fl", CDX_FIELDS)
            .append_pair("filter", "statuscode:200")
            .append_pair("filter", "mimetype:text/html")
            .append_pair("collapse", "digest")
            .append_pair("limit", &limit.to_string())
            .append_pair("showResumeKey", "true");
        if let Some(filter) = params.url_filter() {
            query.append_pair("filter", &filter);
        }
        if let Some(key) = resume_key {
            query.append_pair("resumeKey", key);
        }
    }
    Ok(url)
}

/// Whether a candidate can be part of the analysis.
///
/// Documents without a known year are kept.
pub fn validate_candidate(document: &Document, params: &QueryParameters) -> bool {
    if let Some(year) = document.year {
        if !params.contains_year(year) {
            return false;
        }
    }
    let url = document.provenance.original_url.to_lowercase();
    if url.is_empty() {
        return false;
    }
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(&url);
    !EXCLUDED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn dedup_key(document: &Document) -> String {
    if document.provenance.digest.is_empty() {
        document.identifier.clone()
    } else {
        document.provenance.digest.clone()
    }
}

impl<T: Transport> ArchiveClient<T> {
    /// Search every domain of the request for at most `cap` unique html
    /// captures within the period.
    ///
    /// The cap is split evenly between the domains. A domain that fails
    /// counts as one failed request and is skipped.
    pub async fn plan_and_fetch_candidates(
        &mut self,
        params: &QueryParameters,
        cap: usize,
    ) -> Vec<Document> {
        let domains = if params.domains.is_empty() {
            self.config.default_domains.clone()
        } else {
            params.domains.clone()
        };
        info!(
            "Searching {} domains for {} to {}",
            domains.len(),
            params.start_year,
            params.end_year
        );

        let quotas = split_evenly(cap, domains.len());
        let mut seen = FnvHashSet::default();
        let mut documents = Vec::with_capacity(cap.min(1024));
        let mut searched = 0;

        for (domain, quota) in domains.iter().zip(quotas) {
            if documents.len() >= cap {
                break;
            }
            if quota == 0 {
                continue;
            }
            if searched > 0 {
                self.rate_limit_pause().await;
            }
            searched += 1;

            info!("Searching domain {} for {} pages", domain, quota);
            match self.search_domain(domain, params, quota, &mut seen).await {
                Ok(found) => {
                    info!("Domain {}: {} pages found", domain, found.len());
                    documents.extend(found);
                }
                Err(err) => {
                    error!("Error searching domain {}: {}", domain, err);
                    self.record_failure();
                }
            }
        }

        documents.truncate(cap);
        info!("Search finished: {} pages found", documents.len());
        documents
    }

    async fn search_domain(
        &mut self,
        domain: &str,
        params: &QueryParameters,
        quota: usize,
        seen: &mut FnvHashSet<String>,
    ) -> Result<Vec<Document>, ArchiveError> {
        let mut found = Vec::new();
        let mut resume_key: Option<String> = None;

        for page_num in 0..self.config.max_pages_per_dimension {
            let limit = (quota - found.len()).min(self.config.page_size);
            let url = cdx_query_url(
                &self.config.cdx_endpoint,
                domain,
                params,
                limit,
                resume_key.as_deref(),
            )?;

            let resp = match self.request(&url, self.config.request_timeout).await {
                Some(resp) => resp,
                None => {
                    warn!("No index response for {} page {}", domain, page_num);
                    break;
                }
            };

            let page = CdxPage::parse(&resp.text()).map_err(|error| {
                ArchiveError::MalformedIndexResponse {
                    dimension: domain.to_string(),
                    error,
                }
            })?;
            debug!(
                "{} records on page {} of {}",
                page.records.len(),
                page_num,
                domain
            );

            for record in page.records {
                if !record.is_html() {
                    continue;
                }
                let document = record.into_document(&self.config.wayback_base);
                if !validate_candidate(&document, params) {
                    continue;
                }
                if !seen.insert(dedup_key(&document)) {
                    continue;
                }
                found.push(document);
                if found.len() >= quota {
                    return Ok(found);
                }
            }

            match page.resume_key {
                Some(key) => resume_key = Some(key),
                None => break,
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{test_config, ScriptedTransport};

    fn row(timestamp: &str, original: &str, mimetype: &str, digest: &str) -> String {
        format!(
            r#"["{}","{}","{}","200","{}","1234"]"#,
            timestamp, original, mimetype, digest
        )
    }

    fn page(rows: &[String], resume_key: Option<&str>) -> String {
        let mut out = vec![format!(
            r#"["timestamp","original","mimetype","statuscode","digest","length"]"#
        )];
        out.extend(rows.iter().cloned());
        if let Some(key) = resume_key {
            out.push("[]".to_string());
            out.push(format!(r#"["{}"]"#, key));
        }
        format!("[{}]", out.join(","))
    }

    #[test]
    fn quotas() {
        assert_eq!(split_evenly(10, 5), vec![2, 2, 2, 2, 2]);
        assert_eq!(split_evenly(7, 3), vec![3, 2, 2]);
        assert_eq!(split_evenly(2, 4), vec![1, 1, 0, 0]);
        assert!(split_evenly(5, 0).is_empty());
        assert_eq!(split_evenly(7, 3).iter().sum::<usize>(), 7);
    }

    #[test]
    fn parse_page() {
        let body = page(
            &[
                row("20010101120000", "http://cnn.com/a.html", "text/html", "AAA"),
                row("20010202120000", "http://cnn.com/b.html", "text/html", "BBB"),
            ],
            Some("com,cnn)/b.html 20010202120000"),
        );
        let page = CdxPage::parse(&body).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].digest, "AAA");
        assert_eq!(
            page.resume_key.as_deref(),
            Some("com,cnn)/b.html 20010202120000")
        );
    }

    #[test]
    fn parse_empty_and_malformed() {
        assert_eq!(CdxPage::parse("").unwrap(), CdxPage::default());
        assert_eq!(CdxPage::parse("[]").unwrap(), CdxPage::default());
        assert!(CdxPage::parse("<html>busy</html>").is_err());

        let body = r#"[["timestamp","original"],["2001","http://cnn.com/"]]"#;
        assert!(CdxPage::parse(body).unwrap().records.is_empty());
    }

    #[test]
    fn query_url() {
        let params = QueryParameters::new(2000, 2002, 10).search_terms(vec!["Tech", "a.b"]);
        let url = cdx_query_url(
            "http://web.archive.org/cdx/search/cdx",
            "cnn.com",
            &params,
            5,
            Some("key"),
        )
        .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |name: &str| {
            pairs
                .iter()
                .filter(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(get("url"), vec!["cnn.com/*"]);
        assert_eq!(get("from"), vec!["20000101"]);
        assert_eq!(get("to"), vec!["20021231"]);
        assert_eq!(get("output"), vec!["json"]);
        assert_eq!(get("fl"), vec![CDX_FIELDS]);
        assert_eq!(get("collapse"), vec!["digest"]);
        assert_eq!(get("limit"), vec!["5"]);
        assert_eq!(get("resumeKey"), vec!["key"]);
        assert_eq!(
            get("filter"),
            vec![
                "statuscode:200",
                "mimetype:text/html",
                r"original:.*(tech|a\.b).*"
            ]
        );
    }

    #[test]
    fn normalize_domains() {
        let params = QueryParameters::new(2000, 2000, 1)
            .domains(vec!["https://CNN.com/", " bbc.co.uk", ""]);
        assert_eq!(params.domains, vec!["cnn.com", "bbc.co.uk"]);
    }

    #[test]
    fn record_to_document() {
        let record = CdxRecord::from_row(
            &[
                "20010911083000",
                "http://cnn.com/2001/US/story.html",
                "text/html",
                "200",
                "XYZ",
                "99",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>(),
        )
        .unwrap();
        let doc = record.into_document("http://web.archive.org/web/");
        assert_eq!(doc.identifier, "XYZ_20010911083000");
        assert_eq!(doc.title, "story.html");
        assert_eq!(doc.year, Some(2001));
        assert_eq!(
            doc.provenance.wayback_url,
            "http://web.archive.org/web/20010911083000/http://cnn.com/2001/US/story.html"
        );
        assert_eq!(doc.provenance.source_api, "cdx");
        assert!(!doc.has_content());
    }

    #[test]
    fn validate() {
        let params = QueryParameters::new(2000, 2001, 10);
        let doc = |ts: &str, url: &str| {
            CdxRecord::from_row(
                &[ts, url, "text/html", "200", "D", "1"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>(),
            )
            .unwrap()
            .into_document("http://web.archive.org/web/")
        };
        assert!(validate_candidate(&doc("20000101000000", "http://cnn.com/"), &params));
        assert!(!validate_candidate(&doc("19991231000000", "http://cnn.com/"), &params));
        assert!(!validate_candidate(&doc("20020101000000", "http://cnn.com/"), &params));
        assert!(!validate_candidate(&doc("2001", "http://cnn.com/logo.PNG"), &params));
        assert!(!validate_candidate(&doc("2001", "http://cnn.com/app.js?v=2"), &params));
        assert!(!validate_candidate(&doc("2001", ""), &params));
        // unknown year is kept
        assert!(validate_candidate(&doc("", "http://cnn.com/index.html"), &params));
    }

    #[tokio::test]
    async fn fetch_candidates_across_domains() {
        let transport = ScriptedTransport::default()
            .reply(
                200,
                &page(
                    &[
                        row("20010101000000", "http://cnn.com/a.html", "text/html", "A"),
                        row("20010101000000", "http://cnn.com/pic.jpg", "text/html", "P"),
                        row("20010101000000", "http://cnn.com/feed", "application/rss+xml", "R"),
                        row("20010102000000", "http://cnn.com/b.html", "text/html", "B"),
                    ],
                    None,
                ),
            )
            .reply(
                200,
                &page(
                    &[
                        // same body as on the first domain
                        row("20010103000000", "http://bbc.co.uk/a.html", "text/html", "A"),
                        row("20010104000000", "http://bbc.co.uk/c.html", "text/html", "C"),
                    ],
                    None,
                ),
            );
        let mut client = ArchiveClient::new(transport.clone(), test_config());
        let params = QueryParameters::new(2001, 2001, 4).domains(vec!["cnn.com", "bbc.co.uk"]);
        let docs = client.plan_and_fetch_candidates(&params, 4).await;

        let ids: Vec<_> = docs.iter().map(|d| d.provenance.digest.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(client.stats().failed_requests, 0);
    }

    #[tokio::test]
    async fn follow_resume_key() {
        let transport = ScriptedTransport::default()
            .reply(
                200,
                &page(
                    &[row("20010101000000", "http://cnn.com/a.html", "text/html", "A")],
                    Some("next"),
                ),
            )
            .reply(
                200,
                &page(
                    &[
                        row("20010101000000", "http://cnn.com/b.html", "text/html", "B"),
                        row("20010101000000", "http://cnn.com/c.html", "text/html", "C"),
                    ],
                    Some("more"),
                ),
            );
        let mut client = ArchiveClient::new(transport.clone(), test_config());
        let params = QueryParameters::new(2001, 2001, 2).domains(vec!["cnn.com"]);
        let docs = client.plan_and_fetch_candidates(&params, 2).await;
        assert_eq!(docs.len(), 2);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1]
            .query_pairs()
            .any(|(k, v)| k == "resumeKey" && v == "next"));
        assert!(requests[1].query_pairs().any(|(k, v)| k == "limit" && v == "1"));
    }

    #[tokio::test]
    async fn failed_domain_is_skipped() {
        let transport = ScriptedTransport::default()
            .reply(200, "not json")
            .reply(
                200,
                &page(
                    &[row("20010101000000", "http://bbc.co.uk/a.html", "text/html", "A")],
                    None,
                ),
            );
        let mut client = ArchiveClient::new(transport, test_config());
        let params = QueryParameters::new(2001, 2001, 4).domains(vec!["cnn.com", "bbc.co.uk"]);
        let docs = client.plan_and_fetch_candidates(&params, 4).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(client.stats().total_requests, 2);
        assert_eq!(client.stats().failed_requests, 1);
    }

    #[tokio::test]
    async fn default_domains() {
        let transport = ScriptedTransport::default();
        let mut client = ArchiveClient::new(transport.clone(), test_config());
        let params = QueryParameters::new(2001, 2001, 5);
        let docs = client.plan_and_fetch_candidates(&params, 5).await;
        assert!(docs.is_empty());

        let searched: Vec<String> = transport
            .requests()
            .iter()
            .filter_map(|u| u.query_pairs().find(|(k, _)| k == "url").map(|(_, v)| v.into_owned()))
            .collect();
        assert_eq!(
            searched,
            POPULAR_DOMAINS[..DEFAULT_DOMAIN_COUNT]
                .iter()
                .map(|d| format!("{}/*", d))
                .collect::<Vec<_>>()
        );
    }
}
