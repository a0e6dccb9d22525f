//! NuGet v3 registration index implementation

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{SourceError, TransportError};
use crate::source::PackageSource;
use crate::source::registry::PackageRegistry;
use crate::transport::Transport;

/// Registration index: one or more pages of version leaves
#[derive(Debug, Deserialize)]
struct RegistrationIndex {
    #[serde(default)]
    items: Vec<RegistrationPage>,
}

/// A page either inlines its leaves or must be fetched from `@id`
#[derive(Debug, Deserialize)]
struct RegistrationPage {
    #[serde(rename = "@id")]
    id: String,
    items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Deserialize)]
struct RegistrationLeaf {
    version: Option<String>,
    #[serde(rename = "catalogEntry")]
    catalog_entry: Option<serde_json::Value>,
}

impl RegistrationLeaf {
    fn version(&self) -> Option<&str> {
        self.version.as_deref().or_else(|| {
            self.catalog_entry
                .as_ref()
                .and_then(|entry| entry.get("version"))
                .and_then(|v| v.as_str())
        })
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    items: Vec<RegistrationLeaf>,
}

/// Registry backed by a configured [`PackageSource`]
pub struct NugetRegistry {
    source: PackageSource,
    transport: Arc<dyn Transport>,
}

impl NugetRegistry {
    pub fn new(source: PackageSource, transport: Arc<dyn Transport>) -> Self {
        Self { source, transport }
    }

    pub fn source(&self) -> &PackageSource {
        &self.source
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        lower_id: &str,
    ) -> Result<T, SourceError> {
        let text = match self.transport.get_text(url).await {
            Ok(text) => text,
            Err(TransportError::Status { status: 404, .. }) => {
                return Err(SourceError::NotFound(lower_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&text).map_err(|e| {
            warn!("Failed to parse registration response {}: {}", url, e);
            SourceError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl PackageRegistry for NugetRegistry {
    fn display_name(&self) -> String {
        self.source.display_name.clone()
    }

    fn download_url(&self, lower_id: &str, version: &str) -> String {
        self.source.download_url(lower_id, version)
    }

    async fn fetch_versions(&self, lower_id: &str) -> Result<Vec<String>, SourceError> {
        let url = self.source.versions_url(lower_id);
        let index: RegistrationIndex = self.get_json(&url, lower_id).await?;

        let mut versions = Vec::new();
        for page in index.items {
            let leaves = match page.items {
                Some(leaves) => leaves,
                None => {
                    debug!("Fetching registration page {}", page.id);
                    let response: PageResponse = self.get_json(&page.id, lower_id).await?;
                    response.items
                }
            };
            versions.extend(leaves.iter().filter_map(|l| l.version().map(str::to_string)));
        }

        Ok(versions)
    }
}
