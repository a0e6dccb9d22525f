//! Catalog lookup seam used by the dependency graph resolver

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::catalog::PackageCatalog;
use crate::error::AllSourcesFailed;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetches the catalog of `package_id` at the version `version_spec` resolves to
    ///
    /// # Arguments
    /// * `package_id` - Package id in any casing
    /// * `version_spec` - Exact version, bracket range, or empty for the latest release
    ///
    /// # Returns
    /// * `Ok(Arc<PackageCatalog>)` - The shared, cached catalog
    /// * `Err(Arc<AllSourcesFailed>)` - If no configured source could provide it
    async fn catalog(
        &self,
        package_id: &str,
        version_spec: &str,
    ) -> Result<Arc<PackageCatalog>, Arc<AllSourcesFailed>>;
}
