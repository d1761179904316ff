use std::borrow::Cow;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::{error, warn};
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::time::sleep;
use url::Url;

use crate::analyzer::Config;
use crate::error::ArchiveError;

/// A received response, the body is fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The final url of the response.
    pub url: Url,
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new<B: Into<Bytes>>(url: Url, status: StatusCode, body: B) -> Self {
        Self {
            url,
            status,
            body: body.into(),
        }
    }

    /// The body as text, invalid utf-8 is replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Issues GET requests against the archive.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a GET request and read the whole response.
    ///
    /// Any status is a successful response, errors are reserved for requests
    /// that did not produce a response at all.
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, ArchiveError>;
}

/// [`Transport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(
            USER_AGENT,
            user_agent
                .parse()
                .context("Failed to parse user agent header.")?,
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build http client.")?;

        Ok(Self { client })
    }

    fn classify(url: &Url, error: reqwest::Error) -> ArchiveError {
        if error.is_timeout() {
            ArchiveError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            ArchiveError::Connection {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else {
            ArchiveError::HttpRequestFailure { error }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, ArchiveError> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| HttpTransport::classify(url, err))?;

        let status = resp.status();
        let final_url = resp.url().to_owned();
        let body = resp
            .bytes()
            .await
            .map_err(|err| HttpTransport::classify(url, err))?;

        Ok(HttpResponse::new(final_url, status, body))
    }
}

/// Request counters of a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RequestStats {
    /// Every http request that was sent, retries included.
    pub total_requests: u64,
    /// Requests that ended without a usable response.
    pub failed_requests: u64,
    /// Share of successful requests in percent.
    pub success_rate: f64,
}

impl RequestStats {
    pub fn new(total_requests: u64, failed_requests: u64) -> Self {
        let success_rate = total_requests.saturating_sub(failed_requests) as f64
            / total_requests.max(1) as f64
            * 100.0;
        Self {
            total_requests,
            failed_requests,
            success_rate,
        }
    }
}

/// Client for the archive's index and snapshot endpoints.
///
/// One client is used per analysis run, it owns the request counters of that
/// run. Index queries live in [`crate::cdx`], snapshot downloads in
/// [`crate::fetch`].
#[derive(Debug)]
pub struct ArchiveClient<T = HttpTransport> {
    transport: T,
    pub(crate) config: Config,
    total_requests: u64,
    failed_requests: u64,
    last_request: Option<Instant>,
}

impl<T: Transport> ArchiveClient<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            total_requests: 0,
            failed_requests: 0,
            last_request: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats::new(self.total_requests, self.failed_requests)
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    /// Wait the configured rate limit delay.
    pub(crate) async fn rate_limit_pause(&self) {
        if !self.config.rate_limit_delay.is_zero() {
            sleep(self.config.rate_limit_delay).await;
        }
    }

    /// Keep consecutive requests at least `min_request_interval` apart.
    async fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_request_interval {
                sleep(self.config.min_request_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn send(
        &mut self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, ArchiveError> {
        self.pace().await;
        self.total_requests += 1;
        self.transport.get(url, timeout).await
    }

    /// GET the url and return the response if it is a `200 OK`.
    ///
    /// `429` is retried after twice the rate limit delay, at most
    /// `max_rate_limit_retries` times. `503` is retried once after the rate
    /// limit delay. Everything else is a failure and yields `None`.
    pub async fn request(&mut self, url: &Url, timeout: Duration) -> Option<HttpResponse> {
        let mut rate_limited = 0;
        loop {
            match self.send(url, timeout).await {
                Ok(resp) if resp.status == StatusCode::OK => return Some(resp),
                Ok(resp) if resp.status == StatusCode::TOO_MANY_REQUESTS => {
                    if rate_limited >= self.config.max_rate_limit_retries {
                        warn!(
                            "Rate limit persists after {} retries, giving up on {}",
                            rate_limited, url
                        );
                        break;
                    }
                    rate_limited += 1;
                    warn!("Rate limit exceeded, waiting before retrying {}", url);
                    sleep(self.config.rate_limit_delay * 2).await;
                }
                Ok(resp) if resp.status == StatusCode::SERVICE_UNAVAILABLE => {
                    warn!("Service unavailable, retrying {}", url);
                    sleep(self.config.rate_limit_delay).await;
                    match self.send(url, timeout).await {
                        Ok(resp) if resp.status == StatusCode::OK => return Some(resp),
                        Ok(resp) => warn!("HTTP {} for {}", resp.status.as_u16(), url),
                        Err(err) => warn!("{}", err),
                    }
                    break;
                }
                Ok(resp) => {
                    warn!(
                        "{}",
                        ArchiveError::NoHttpSuccess {
                            status: resp.status,
                            url: url.to_string(),
                        }
                    );
                    break;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!("{}", err);
                    } else {
                        error!("{}", err);
                    }
                    if let ArchiveError::Connection { .. } = err {
                        sleep(self.config.rate_limit_delay).await;
                    }
                    break;
                }
            }
        }
        self.record_failure();
        None
    }
}
