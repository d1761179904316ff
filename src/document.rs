use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use url::Url;

/// Number of chars of the content that are part of the exported metadata.
pub const CONTENT_PREVIEW_LEN: usize = 500;

/// Where the document was found in the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// The url of the page at capture time.
    pub original_url: String,
    /// The url of the archived snapshot.
    pub wayback_url: String,
    /// Mime type reported by the index.
    pub mimetype: String,
    /// Content digest, identical bodies share it.
    pub digest: String,
    /// Which archive api produced the record.
    pub source_api: String,
}

/// A historical web page.
///
/// Created from an index record, its content is assigned once after the
/// snapshot was downloaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub identifier: String,
    pub title: String,
    pub date: Option<NaiveDateTime>,
    pub year: Option<i32>,
    #[serde(rename = "content")]
    text_content: String,
    pub provenance: Provenance,
}

impl Document {
    /// Create a new document without content, the year is taken from the
    /// `date` if not provided.
    pub fn new<I: ToString, T: ToString>(
        identifier: I,
        title: T,
        date: Option<NaiveDateTime>,
        year: Option<i32>,
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            year: year.or_else(|| date.map(|d| d.year())),
            date,
            text_content: String::new(),
            provenance: Provenance::default(),
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// The cleaned text, empty until fetched.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text_content
    }

    #[inline]
    pub fn has_content(&self) -> bool {
        !self.text_content.is_empty()
    }

    pub fn set_content<T: Into<String>>(&mut self, content: T) {
        self.text_content = content.into();
    }

    /// Number of chars of the content.
    pub fn content_length(&self) -> usize {
        self.text_content.chars().count()
    }

    /// The flattened view used by exports.
    pub fn metadata(&self) -> DocumentMetadata<'_> {
        let content_preview = if self.content_length() > CONTENT_PREVIEW_LEN {
            let mut preview: String = self.text_content.chars().take(CONTENT_PREVIEW_LEN).collect();
            preview.push_str("...");
            preview
        } else {
            self.text_content.clone()
        };

        DocumentMetadata {
            identifier: &self.identifier,
            title: &self.title,
            date: self.date,
            year: self.year,
            content_length: self.content_length(),
            content_preview,
            provenance: &self.provenance,
        }
    }

    /// Derive a title from the last path segment of the url, without the
    /// query.
    pub fn title_from_url(url: &str) -> String {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(segment) = parsed
                .path_segments()
                .and_then(|s| s.filter(|s| !s.is_empty()).last())
            {
                return segment.to_string();
            }
            if let Some(host) = parsed.host_str() {
                return host.to_string();
            }
        }
        let without_query = url.split('?').next().unwrap_or(url);
        without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(url)
            .to_string()
    }
}

/// Document metadata together with a short preview of the content.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetadata<'a> {
    pub identifier: &'a str,
    pub title: &'a str,
    pub date: Option<NaiveDateTime>,
    pub year: Option<i32>,
    pub content_length: usize,
    pub content_preview: String,
    #[serde(flatten)]
    pub provenance: &'a Provenance,
}
