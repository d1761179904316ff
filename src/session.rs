use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::archive::RequestStats;
use crate::document::Document;
use crate::frequency::{FrequencyTable, TermCount};

/// Stages of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Querying,
    Fetching,
    Aggregating,
    Summarizing,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Querying => "querying",
            Phase::Fetching => "fetching",
            Phase::Aggregating => "aggregating",
            Phase::Summarizing => "summarizing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a single analysis run accumulates.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    documents: Vec<Document>,
    frequencies: FrequencyTable,
    top_terms: Vec<TermCount>,
    request_stats: Option<RequestStats>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Querying,
            documents: Vec::new(),
            frequencies: FrequencyTable::new(),
            top_terms: Vec::new(),
            request_stats: None,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn advance(&mut self, phase: Phase) {
        info!("Analysis phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    #[inline]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn set_documents(&mut self, documents: Vec<Document>) {
        self.documents = documents;
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn set_frequencies(&mut self, frequencies: FrequencyTable) {
        self.frequencies = frequencies;
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.frequencies
    }

    pub fn set_top_terms(&mut self, top_terms: Vec<TermCount>) {
        self.top_terms = top_terms;
    }

    pub fn top_terms(&self) -> &[TermCount] {
        &self.top_terms
    }

    pub fn set_request_stats(&mut self, stats: RequestStats) {
        self.request_stats = Some(stats);
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            total_documents: self.documents.len(),
            documents_with_content: self.documents.iter().filter(|d| d.has_content()).count(),
            total_unique_terms: self.frequencies.len(),
            top_terms_count: self.top_terms.len(),
            elapsed_time_minutes: self.started.elapsed().as_secs_f64() / 60.0,
            session_stats: self.request_stats,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Document>, FrequencyTable, Vec<TermCount>) {
        (self.documents, self.frequencies, self.top_terms)
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

/// Counts describing a finished session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total_documents: usize,
    pub documents_with_content: usize,
    pub total_unique_terms: usize,
    pub top_terms_count: usize,
    pub elapsed_time_minutes: f64,
    pub session_stats: Option<RequestStats>,
}
