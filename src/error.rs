use reqwest::StatusCode;
use thiserror::Error;

use crate::language::Language;

/// All different error types this crate uses.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Received a non success Http response.
    #[error("Expected a 200 OK but got {status} for {url}")]
    NoHttpSuccess {
        /// Status of the response.
        status: StatusCode,
        /// The requested url.
        url: String,
    },
    /// The request did not complete in time.
    #[error("Request to {url} timed out")]
    Timeout {
        /// The requested url.
        url: String,
    },
    /// No connection to the archive could be established.
    #[error("Failed to connect to {url}: {reason}")]
    Connection {
        /// The requested url.
        url: String,
        /// What went wrong.
        reason: String,
    },
    /// Failed to get a response for other reasons.
    #[error("Request failed: {error}")]
    HttpRequestFailure {
        /// The reqwest error.
        #[from]
        error: reqwest::Error,
    },
    /// The index returned a body that is not a list of records.
    #[error("Malformed index response for {dimension}: {error}")]
    MalformedIndexResponse {
        /// The domain that was queried.
        dimension: String,
        /// The parsing error.
        error: serde_json::Error,
    },
    /// A url could not be built.
    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The requested period ends before it starts.
    #[error("Invalid year range: {start_year} is after {end_year}")]
    InvalidYearRange { start_year: i32, end_year: i32 },
    /// There is no way to recognize content in the language.
    #[error("Unsupported content language: {}", .0.full_name())]
    UnsupportedLanguage(Language),
    /// The index returned nothing usable for the requested period.
    #[error("No documents found")]
    NoCandidates,
}

impl ArchiveError {
    /// Whether this error comes from a network problem that might go away.
    pub fn is_transient(&self) -> bool {
        match self {
            ArchiveError::Timeout { .. } | ArchiveError::Connection { .. } => true,
            ArchiveError::NoHttpSuccess { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::SERVICE_UNAVAILABLE
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(ArchiveError::Timeout { url: "u".into() }.is_transient());
        assert!(ArchiveError::NoHttpSuccess {
            status: StatusCode::SERVICE_UNAVAILABLE,
            url: "u".into()
        }
        .is_transient());
        assert!(!ArchiveError::NoHttpSuccess {
            status: StatusCode::NOT_FOUND,
            url: "u".into()
        }
        .is_transient());
        assert!(!ArchiveError::NoCandidates.is_transient());
    }

    #[test]
    fn messages() {
        assert_eq!(ArchiveError::NoCandidates.to_string(), "No documents found");
        assert_eq!(
            ArchiveError::UnsupportedLanguage(Language::Other("fr".into())).to_string(),
            "Unsupported content language: fr"
        );
    }
}
