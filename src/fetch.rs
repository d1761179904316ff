//! Downloading and cleaning of archived snapshots.

use log::{debug, warn};
use url::Url;

use crate::archive::{ArchiveClient, Transport};
use crate::clean::{clean_text_content, html_to_text};
use crate::document::Document;

impl<T: Transport> ArchiveClient<T> {
    /// Download the snapshot of the document and extract its English text.
    ///
    /// Returns an empty string if the snapshot could not be downloaded or its
    /// text does not look like English.
    pub async fn fetch_text(&mut self, document: &Document) -> String {
        let wayback_url = &document.provenance.wayback_url;
        if wayback_url.is_empty() {
            warn!("No snapshot url for {}", document.identifier);
            return String::new();
        }
        let url = match Url::parse(wayback_url) {
            Ok(url) => url,
            Err(err) => {
                warn!("Invalid snapshot url {}: {}", wayback_url, err);
                return String::new();
            }
        };

        debug!("Downloading snapshot {}", url);
        let resp = match self.request(&url, self.config.snapshot_timeout).await {
            Some(resp) => resp,
            None => return String::new(),
        };

        let text = html_to_text(&resp.text());
        if !self.config.english.is_english(&text) {
            debug!("Discarding non english content of {}", document.identifier);
            return String::new();
        }
        clean_text_content(&text)
    }
}
