//! Cached, failover-aware access to version sets and package catalogs

use std::sync::Arc;

use tracing::{debug, warn};

use crate::archive::RemoteArchiveReader;
use crate::cache::MemoizingCache;
use crate::catalog::{CatalogOptions, PackageCatalog, PackageIdentity};
use crate::config::Config;
use crate::error::{AllSourcesFailed, TransportError};
use crate::resolver::provider::CatalogProvider;
use crate::source::PackageSource;
use crate::source::failover::PackageSourceFailover;
use crate::source::nuget::NugetRegistry;
use crate::source::registry::PackageRegistry;
use crate::transport::{HttpTransport, Transport};
use crate::version::nuget::Version;
use crate::version::set::VersionSet;

type Shared<T> = Result<Arc<T>, Arc<AllSourcesFailed>>;

pub struct PackageRepository {
    failover: PackageSourceFailover,
    reader: RemoteArchiveReader,
    versions: MemoizingCache<String, Shared<VersionSet>>,
    /// Keyed by lowercase id and normalized version
    catalogs: MemoizingCache<(String, String), Shared<PackageCatalog>>,
    options: CatalogOptions,
}

impl PackageRepository {
    pub fn new(
        failover: PackageSourceFailover,
        reader: RemoteArchiveReader,
        config: &Config,
    ) -> Self {
        let cache = &config.cache;
        Self {
            failover,
            reader,
            versions: MemoizingCache::new(cache.versions_ttl())
                .with_error_ttl(cache.catalog_error_ttl()),
            catalogs: MemoizingCache::new(cache.catalog_ttl())
                .with_error_ttl(cache.catalog_error_ttl()),
            options: CatalogOptions {
                load_xml_docs: config.catalog.load_xml_docs,
            },
        }
    }

    /// Build a repository over the configured sources sharing one transport
    pub fn with_transport(transport: Arc<dyn Transport>, config: &Config) -> Self {
        let registries: Vec<Arc<dyn PackageRegistry>> = config
            .sources
            .iter()
            .cloned()
            .map(|source: PackageSource| {
                let registry = NugetRegistry::new(source, transport.clone());
                Arc::new(registry) as Arc<dyn PackageRegistry>
            })
            .collect();
        let reader = RemoteArchiveReader::new(transport, config.cache.catalog_ttl());
        Self::new(PackageSourceFailover::new(registries), reader, config)
    }

    /// Build a repository that talks HTTP with the configured client settings
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config.http.user_agent, config.http.timeout())?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Published versions of `package_id`, cached per lowercase id
    pub async fn versions(
        &self,
        package_id: &str,
    ) -> Result<Arc<VersionSet>, Arc<AllSourcesFailed>> {
        let lower_id = package_id.trim().to_lowercase();
        self.versions
            .get_or_fetch_result(lower_id.clone(), || async {
                VersionSet::fetch(&self.failover, &lower_id)
                    .await
                    .map(Arc::new)
                    .map_err(Arc::new)
            })
            .await
    }

    /// Resolve a version request against the published versions.
    ///
    /// When no listing can be fetched the request itself becomes a
    /// placeholder version, so downloads can still be attempted.
    pub async fn resolve_identity(&self, package_id: &str, version_spec: &str) -> PackageIdentity {
        let version = match self.versions(package_id).await {
            Ok(set) => set.resolve(version_spec),
            Err(e) => {
                warn!(
                    "Using requested version {:?} of {}: {}",
                    version_spec, package_id, e
                );
                Version::placeholder(version_spec)
            }
        };
        PackageIdentity::new(package_id.trim(), version)
    }

    /// Catalog of one concrete version, tried against every source in order
    pub async fn catalog_for(&self, identity: &PackageIdentity) -> Shared<PackageCatalog> {
        let lower_id = identity.lower_id();
        let version = identity.version.download_text();
        let key = (lower_id.clone(), identity.version.normalized().to_lowercase());

        self.catalogs
            .get_or_fetch_result(key, || async {
                let operation = format!("load catalog of {} {}", lower_id, version);
                self.failover
                    .first_success(&operation, |registry| {
                        let url = registry.download_url(&lower_id, &version);
                        let identity = identity.clone();
                        async move {
                            debug!("Loading catalog from {}", url);
                            PackageCatalog::load(&self.reader, identity, &url, self.options).await
                        }
                    })
                    .await
                    .map(Arc::new)
                    .map_err(Arc::new)
            })
            .await
    }

    /// Resolve `version_spec` and load the matching catalog
    pub async fn resolve_catalog(
        &self,
        package_id: &str,
        version_spec: &str,
    ) -> Shared<PackageCatalog> {
        let identity = self.resolve_identity(package_id, version_spec).await;
        self.catalog_for(&identity).await
    }

    /// Drop every cached entry for `package_id`
    pub fn invalidate(&self, package_id: &str) {
        let lower_id = package_id.trim().to_lowercase();
        self.versions.invalidate(&lower_id);
        self.catalogs.retain(|(id, _)| *id != lower_id);
    }

    pub fn purge_expired(&self) {
        self.versions.purge_expired();
        self.catalogs.purge_expired();
        self.reader.purge_expired();
    }
}

#[async_trait::async_trait]
impl CatalogProvider for PackageRepository {
    async fn catalog(
        &self,
        package_id: &str,
        version_spec: &str,
    ) -> Result<Arc<PackageCatalog>, Arc<AllSourcesFailed>> {
        self.resolve_catalog(package_id, version_spec).await
    }
}
