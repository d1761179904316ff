use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::{Document, DocumentMetadata};
use crate::frequency::{FrequencyTable, TermCount};
use crate::session::{Session, SessionSummary};

/// Version of the analyzer that produced a report.
pub const ANALYZER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub analyzer_version: String,
    pub analysis_date: DateTime<Utc>,
    /// Number of distinct terms that were counted.
    pub total_terms_analyzed: usize,
    /// Documents whose content contributed to the counts.
    pub documents_processed: usize,
}

/// Result of a successful analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub summary: SessionSummary,
    pub documents: Vec<Document>,
    pub frequencies: FrequencyTable,
    pub top_terms: Vec<TermCount>,
    pub analysis_metadata: AnalysisMetadata,
}

impl AnalysisReport {
    pub fn from_session(session: Session) -> Self {
        let summary = session.summary();
        let (documents, frequencies, top_terms) = session.into_parts();
        let analysis_metadata = AnalysisMetadata {
            analyzer_version: ANALYZER_VERSION.to_string(),
            analysis_date: Utc::now(),
            total_terms_analyzed: frequencies.len(),
            documents_processed: summary.documents_with_content,
        };
        Self {
            summary,
            documents,
            frequencies,
            top_terms,
            analysis_metadata,
        }
    }

    /// `(term, count)` rows of the full frequency table, for tabular export.
    pub fn term_rows(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.frequencies.iter()
    }

    pub fn document_metadata(&self) -> Vec<DocumentMetadata<'_>> {
        self.documents.iter().map(Document::metadata).collect()
    }
}

/// What an analysis run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Completed(Box<AnalysisReport>),
    Failed { error: String },
}

impl AnalysisOutcome {
    pub fn failed<T: ToString>(error: T) -> Self {
        AnalysisOutcome::Failed {
            error: error.to_string(),
        }
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, AnalysisOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Completed(report) => Some(report.as_ref()),
            AnalysisOutcome::Failed { .. } => None,
        }
    }

    pub fn into_report(self) -> Option<AnalysisReport> {
        match self {
            AnalysisOutcome::Completed(report) => Some(*report),
            AnalysisOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Completed(_) => None,
            AnalysisOutcome::Failed { error } => Some(error.as_str()),
        }
    }
}
