//! In-memory transport serving archives and registration listings

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use package_lens::error::TransportError;
use package_lens::source::PackageSource;
use package_lens::transport::{RangeResponse, Transport};

/// Serves byte buffers with range semantics and text bodies by URL.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct InMemoryTransport {
    files: HashMap<String, Bytes>,
    texts: HashMap<String, String>,
    range_requests: AtomicUsize,
    text_requests: AtomicUsize,
    requested_urls: Mutex<Vec<String>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, contents: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), Bytes::from(contents));
        self
    }

    pub fn with_text(mut self, url: &str, body: &str) -> Self {
        self.texts.insert(url.to_string(), body.to_string());
        self
    }

    /// Publish a package on the `mem://<source>` test source: a registration
    /// index with inline leaves plus one archive per version, stored under
    /// the lowercase version without build metadata
    pub fn with_package(
        mut self,
        source: &str,
        id: &str,
        packages: Vec<(&str, Vec<u8>)>,
    ) -> Self {
        let lower_id = id.to_lowercase();
        let leaves: Vec<_> = packages
            .iter()
            .map(|(version, _)| json!({ "catalogEntry": { "version": version } }))
            .collect();
        let index = json!({
            "items": [{
                "@id": format!("mem://{}/reg/{}/page/1.json", source, lower_id),
                "items": leaves,
            }]
        });
        self.texts.insert(
            format!("mem://{}/reg/{}/index.json", source, lower_id),
            index.to_string(),
        );

        for (version, archive) in packages {
            let stored = version.split('+').next().unwrap_or(version).to_lowercase();
            let url = format!("mem://{}/pkg/{}/{}.nupkg", source, lower_id, stored);
            self.files.insert(url, Bytes::from(archive));
        }
        self
    }

    pub fn range_requests(&self) -> usize {
        self.range_requests.load(Ordering::SeqCst)
    }

    pub fn text_requests(&self) -> usize {
        self.text_requests.load(Ordering::SeqCst)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested_urls.lock().unwrap().clone()
    }

    fn record(&self, url: &str) {
        self.requested_urls.lock().unwrap().push(url.to_string());
    }
}

/// Source whose URLs are served by [`InMemoryTransport::with_package`]
pub fn test_source(name: &str) -> PackageSource {
    PackageSource {
        domain_url: format!("mem://{}", name),
        display_name: name.to_string(),
        display_url: name.to_string(),
        versions_url_format: format!("mem://{}/reg/{{0}}/index.json", name),
        download_url_format: format!("mem://{}/pkg/{{0}}/{{1}}.nupkg", name),
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn get_range(
        &self,
        url: &str,
        offset: u64,
        length: u64,
    ) -> Result<RangeResponse, TransportError> {
        self.range_requests.fetch_add(1, Ordering::SeqCst);
        self.record(url);

        let Some(file) = self.files.get(url) else {
            return Err(TransportError::Status {
                status: 404,
                url: url.to_string(),
            });
        };
        let total = file.len() as u64;
        let start = offset.min(total) as usize;
        let stop = offset.saturating_add(length).min(total) as usize;
        Ok(RangeResponse {
            bytes: file.slice(start..stop),
            total_length: total,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        self.text_requests.fetch_add(1, Ordering::SeqCst);
        self.record(url);

        self.texts.get(url).cloned().ok_or_else(|| TransportError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}
