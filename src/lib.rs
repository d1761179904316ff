pub use analyzer::{AnalysisRequest, Analyzer, Config, ConfigBuilder};
pub use archive::{ArchiveClient, HttpResponse, HttpTransport, RequestStats, Transport};
pub use cdx::QueryParameters;
pub use document::Document;
pub use error::ArchiveError;
pub use frequency::{FrequencyAggregator, FrequencyTable, TermCount};
pub use language::{EnglishHeuristic, Language};
pub use report::{AnalysisOutcome, AnalysisReport};
pub use text::{CacheStats, TermExtractor};

pub mod analyzer;
pub mod archive;
pub mod cdx;
pub mod clean;
pub mod date;
pub mod document;
mod error;
mod fetch;
pub mod frequency;
pub mod language;
pub mod report;
pub mod session;
pub mod stopwords;
pub mod text;
