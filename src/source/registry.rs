//! Registry trait for listing package versions and locating archives

#[cfg(test)]
use mockall::automock;

use crate::error::SourceError;

/// One package source as seen by the failover layer
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Human readable name used in logs and aggregate errors
    fn display_name(&self) -> String;

    /// URL of the package archive for an exact version
    fn download_url(&self, lower_id: &str, version: &str) -> String;

    /// Fetches every published version string of a package
    ///
    /// # Arguments
    /// * `lower_id` - The lowercase package id
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - Version strings in registry order, possibly empty
    /// * `Err(SourceError)` - If the listing could not be fetched or parsed
    async fn fetch_versions(&self, lower_id: &str) -> Result<Vec<String>, SourceError>;
}
