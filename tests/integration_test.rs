use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use url::Url;

use wayback_terms::{
    AnalysisOutcome, AnalysisRequest, Analyzer, ArchiveError, Config, HttpResponse, Language,
    Transport,
};

type Replies = VecDeque<(u16, String)>;

#[derive(Default)]
struct StubState {
    index: HashMap<String, Replies>,
    snapshots: Vec<(String, Replies)>,
    requests: Vec<Url>,
}

/// In memory archive, answers index queries per domain and snapshot
/// downloads per url suffix. The last reply of a queue is repeated.
#[derive(Clone, Default)]
struct ArchiveStub {
    state: Arc<Mutex<StubState>>,
}

impl ArchiveStub {
    fn index(self, domain: &str, status: u16, body: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .index
            .entry(domain.to_string())
            .or_default()
            .push_back((status, body.to_string()));
        self
    }

    fn snapshot(self, suffix: &str, status: u16, body: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            match state.snapshots.iter_mut().find(|entry| entry.0 == suffix) {
                Some(entry) => entry.1.push_back((status, body.to_string())),
                None => state
                    .snapshots
                    .push((suffix.to_string(), vec![(status, body.to_string())].into())),
            }
        }
        self
    }

    fn requests(&self) -> Vec<Url> {
        self.state.lock().unwrap().requests.clone()
    }
}

fn next_reply(replies: &mut Replies) -> Option<(u16, String)> {
    if replies.len() > 1 {
        replies.pop_front()
    } else {
        replies.front().cloned()
    }
}

#[async_trait]
impl Transport for ArchiveStub {
    async fn get(&self, url: &Url, _timeout: Duration) -> Result<HttpResponse, ArchiveError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(url.clone());

        let reply = if url.path().starts_with("/cdx/") {
            let domain = url
                .query_pairs()
                .find(|(k, _)| k == "url")
                .map(|(_, v)| v.trim_end_matches("/*").to_string())
                .unwrap_or_default();
            state.index.get_mut(&domain).and_then(next_reply)
        } else {
            let requested = url.as_str().to_string();
            state
                .snapshots
                .iter_mut()
                .find(|entry| requested.ends_with(entry.0.as_str()))
                .and_then(|entry| next_reply(&mut entry.1))
        };

        let (status, body) = reply.unwrap_or((404, String::new()));
        Ok(HttpResponse::new(
            url.clone(),
            StatusCode::from_u16(status).unwrap(),
            body,
        ))
    }
}

fn cdx_body(rows: &[(&str, &str, &str)]) -> String {
    let mut out = vec![json!([
        "timestamp",
        "original",
        "mimetype",
        "statuscode",
        "digest",
        "length"
    ])];
    for (timestamp, original, digest) in rows {
        out.push(json!([timestamp, original, "text/html", "200", digest, "2048"]));
    }
    serde_json::to_string(&out).unwrap()
}

fn config() -> Config {
    Config::builder()
        .rate_limit_delay(Duration::from_millis(0))
        .min_request_interval(Duration::from_millis(0))
        .parallel(false)
        .build()
}

const PAGE_A: &str = "<html><body>
    <p>The computer is a machine that can do all of the work for you and me.</p>
    <p>Technology is what the computer brings to all of us in this new age.</p>
    </body></html>";

const PAGE_B: &str = "<html><body>
    <p>A computer on every desk and in every home was the dream of the industry.</p>
    </body></html>";

fn cnn_stub() -> ArchiveStub {
    ArchiveStub::default()
        .index(
            "cnn.com",
            200,
            &cdx_body(&[
                ("20010101000000", "http://cnn.com/a.html", "AAA"),
                ("20010601000000", "http://cnn.com/b.html", "BBB"),
                ("20011201000000", "http://cnn.com/c.html", "CCC"),
            ]),
        )
        .snapshot("cnn.com/a.html", 200, PAGE_A)
        .snapshot("cnn.com/b.html", 200, PAGE_B)
        .snapshot("cnn.com/c.html", 404, "")
}

#[tokio::test]
async fn analyze_period() {
    let stub = cnn_stub();
    let mut analyzer = Analyzer::with_transport(stub.clone(), config());
    let outcome = analyzer
        .analyze_period(
            AnalysisRequest::new(2001, 2001)
                .max_documents(10)
                .domains(vec!["cnn.com"]),
        )
        .await;

    let report = outcome.into_report().expect("analysis completed");
    assert_eq!(report.summary.total_documents, 3);
    assert_eq!(report.summary.documents_with_content, 2);
    assert_eq!(report.analysis_metadata.documents_processed, 2);
    assert_eq!(report.frequencies.get("computer"), Some(3));
    assert_eq!(report.frequencies.get("technology"), Some(1));
    assert_eq!(report.frequencies.get("the"), None);
    assert_eq!(report.top_terms[0].term, "computer");
    assert_eq!(report.top_terms[0].count, 3);
    assert!(report.top_terms.iter().all(|t| t.count > 1));
    assert_eq!(
        report.analysis_metadata.total_terms_analyzed,
        report.term_rows().count()
    );
    assert_eq!(
        report.analysis_metadata.total_terms_analyzed,
        report.summary.total_unique_terms
    );

    let with_content: Vec<_> = report
        .documents
        .iter()
        .filter(|d| d.has_content())
        .map(|d| d.identifier.as_str())
        .collect();
    assert_eq!(with_content, vec!["AAA_20010101000000", "BBB_20010601000000"]);

    // one index query and three snapshots
    assert_eq!(stub.requests().len(), 4);
    let stats = analyzer.stats();
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.success_rate, 75.0);
    assert_eq!(report.summary.session_stats, Some(stats));
}

#[tokio::test]
async fn no_documents_found() {
    let stub = ArchiveStub::default().index("cnn.com", 200, "");
    let mut analyzer = Analyzer::with_transport(stub, config());
    let outcome = analyzer
        .analyze_period(AnalysisRequest::new(1995, 1996).domains(vec!["cnn.com"]))
        .await;

    assert_eq!(outcome.error(), Some("No documents found"));
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({ "error": "No documents found" })
    );
}

#[tokio::test]
async fn out_of_range_captures_are_dropped() {
    let stub = ArchiveStub::default().index(
        "cnn.com",
        200,
        &cdx_body(&[
            ("19991231235959", "http://cnn.com/old.html", "OLD"),
            ("20030101000000", "http://cnn.com/new.html", "NEW"),
        ]),
    );
    let mut analyzer = Analyzer::with_transport(stub.clone(), config());
    let outcome = analyzer
        .analyze_period(AnalysisRequest::new(2000, 2002).domains(vec!["cnn.com"]))
        .await;

    assert_eq!(outcome.error(), Some("No documents found"));
    // no snapshot was downloaded
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn rate_limiting_is_transparent() {
    let stub = ArchiveStub::default()
        .index(
            "cnn.com",
            200,
            &cdx_body(&[("20010101000000", "http://cnn.com/a.html", "AAA")]),
        )
        .snapshot("cnn.com/a.html", 429, "")
        .snapshot("cnn.com/a.html", 200, PAGE_A);
    let mut analyzer = Analyzer::with_transport(stub, config());
    let outcome = analyzer
        .analyze_period(AnalysisRequest::new(2001, 2001).domains(vec!["cnn.com"]))
        .await;

    let report = outcome.into_report().expect("analysis completed");
    assert_eq!(report.summary.documents_with_content, 1);
    assert_eq!(report.frequencies.get("computer"), Some(2));
    assert_eq!(analyzer.stats().total_requests, 3);
    assert_eq!(analyzer.stats().failed_requests, 0);
}

#[tokio::test]
async fn failing_domain_is_skipped() {
    let stub = cnn_stub()
        .index("bbc.co.uk", 503, "")
        .index("bbc.co.uk", 503, "");
    let mut analyzer = Analyzer::with_transport(stub, config());
    let outcome = analyzer
        .analyze_period(
            AnalysisRequest::new(2001, 2001)
                .max_documents(6)
                .domains(vec!["bbc.co.uk", "cnn.com"]),
        )
        .await;

    let report = outcome.into_report().expect("analysis completed");
    assert_eq!(report.summary.total_documents, 3);
    // two index attempts for bbc, one for cnn, three snapshots
    assert_eq!(analyzer.stats().total_requests, 6);
    assert_eq!(analyzer.stats().failed_requests, 2);
}

#[tokio::test]
async fn unsupported_language() {
    let stub = cnn_stub();
    let mut analyzer = Analyzer::with_transport(stub.clone(), config());
    let outcome = analyzer
        .analyze_period(
            AnalysisRequest::new(2001, 2001)
                .domains(vec!["cnn.com"])
                .language("de".parse().unwrap_or_else(|other: Language| other)),
        )
        .await;

    assert!(!outcome.is_completed());
    assert!(outcome
        .error()
        .unwrap()
        .contains("Unsupported content language"));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn term_cache_spans_runs() {
    let mut analyzer = Analyzer::with_transport(cnn_stub(), config());
    let request = AnalysisRequest::new(2001, 2001).domains(vec!["cnn.com"]);

    let first = analyzer.analyze_period(request.clone()).await;
    assert!(first.is_completed());
    assert_eq!(analyzer.cache_stats().cache_hits, 0);

    let second = analyzer.analyze_period(request).await;
    assert!(second.is_completed());
    let cache = analyzer.cache_stats();
    assert_eq!(cache.cache_hits, 2);
    assert_eq!(cache.cache_misses, 2);
    // each run counts its own requests
    assert_eq!(analyzer.stats().total_requests, 4);

    assert!(matches!(first, AnalysisOutcome::Completed(_)));
    assert_eq!(
        first.report().unwrap().frequencies,
        second.report().unwrap().frequencies
    );
}
