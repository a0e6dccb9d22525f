//! Symbol resolution across a package's dependency graph
//!
//! - [`provider`]: catalog lookup seam
//! - [`state`]: visit set and found flag shared by one search
//!
//! A search first checks the package's own assemblies, then fans out one
//! spawned task per dependency. The first branch that finds the symbol wins;
//! other branches notice the shared flag and stop, and whatever they were
//! still fetching is discarded.

pub mod provider;
pub mod state;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::FuturesUnordered;
use tracing::{debug, info, warn};

use crate::cache::MemoizingCache;
use crate::catalog::framework::normalize_framework;
use crate::catalog::{DependencyRef, FrameworkEntry, PackageAssembly, PackageCatalog};
use crate::error::AllSourcesFailed;
use crate::resolver::provider::CatalogProvider;
use crate::resolver::state::SearchState;

/// Location of the assembly that defines a symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRef {
    pub package_id: String,
    pub version: String,
    pub moniker: String,
    /// Entry path inside the archive
    pub path: String,
    pub archive_url: String,
}

impl AssemblyRef {
    fn new(
        catalog: &PackageCatalog,
        framework: &FrameworkEntry,
        assembly: &PackageAssembly,
    ) -> Self {
        Self {
            package_id: catalog.identity.id.clone(),
            version: catalog.identity.version.to_string(),
            moniker: framework.moniker.clone(),
            path: assembly.entry.full_path.clone(),
            archive_url: catalog.archive_url.clone(),
        }
    }
}

impl fmt::Display for AssemblyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) {}",
            self.package_id, self.version, self.moniker, self.path
        )
    }
}

/// A dependency whose catalog could not be fetched
#[derive(Debug, Clone)]
pub struct ResolveFailure {
    pub dependency: DependencyRef,
    pub error: Arc<AllSourcesFailed>,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.dependency.package_id, self.dependency.version_spec, self.error
        )
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(AssemblyRef),
    NotFound,
    /// Nothing found, and at least one dependency could not be searched
    Failed(Vec<ResolveFailure>),
}

impl Resolution {
    pub fn assembly(&self) -> Option<&AssemblyRef> {
        match self {
            Resolution::Found(assembly) => Some(assembly),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// (package, version, moniker, symbol), all lowercase
type ResolutionKey = (String, String, String, String);

struct ResolverInner {
    provider: Arc<dyn CatalogProvider>,
    reserved_prefixes: Vec<String>,
    resolutions: MemoizingCache<ResolutionKey, Resolution>,
}

impl ResolverInner {
    fn is_reserved(&self, package_id: &str) -> bool {
        let lower = package_id.to_lowercase();
        self.reserved_prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
    }

    /// Unreserved dependencies first, declaration order otherwise kept
    fn search_order<'a, I>(&self, dependencies: I) -> Vec<DependencyRef>
    where
        I: IntoIterator<Item = &'a DependencyRef>,
    {
        let mut ordered: Vec<DependencyRef> = dependencies.into_iter().cloned().collect();
        ordered.sort_by_key(|d| self.is_reserved(&d.package_id));
        ordered
    }
}

/// Finds which package in a dependency graph defines a symbol
#[derive(Clone)]
pub struct DependencyGraphResolver {
    inner: Arc<ResolverInner>,
}

impl DependencyGraphResolver {
    /// Creates a resolver that searches packages whose id starts with one of
    /// `reserved_prefixes` only after every other dependency, and remembers
    /// answers for `resolution_ttl`
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        reserved_prefixes: Vec<String>,
        resolution_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                provider,
                reserved_prefixes,
                resolutions: MemoizingCache::new(resolution_ttl),
            }),
        }
    }

    /// Resolve `symbol` starting from a package given by id and version request
    pub async fn resolve_package(
        &self,
        package_id: &str,
        version_spec: &str,
        moniker: &str,
        symbol: &str,
    ) -> Resolution {
        match self.inner.provider.catalog(package_id, version_spec).await {
            Ok(catalog) => self.resolve(catalog, moniker, symbol).await,
            Err(error) => Resolution::Failed(vec![ResolveFailure {
                dependency: DependencyRef {
                    package_id: package_id.to_string(),
                    version_spec: version_spec.to_string(),
                },
                error,
            }]),
        }
    }

    /// Resolve `symbol` in `catalog` or anything it depends on.
    ///
    /// Found and not-found answers are cached; failures are not, so a later
    /// call retries the unreachable dependencies.
    pub async fn resolve(
        &self,
        catalog: Arc<PackageCatalog>,
        moniker: &str,
        symbol: &str,
    ) -> Resolution {
        let moniker = normalize_framework(moniker);
        let key = (
            catalog.identity.lower_id(),
            catalog.identity.version.normalized().to_lowercase(),
            moniker.clone(),
            symbol.trim().to_lowercase(),
        );
        if let Some(resolution) = self.inner.resolutions.get(&key) {
            debug!("Resolution cache hit for {} in {}", symbol, catalog.identity);
            return resolution;
        }

        let state = Arc::new(SearchState::new());
        state.mark_visited(&catalog.identity.lower_id());

        let root = catalog.identity.to_string();
        let resolution = search_framework(
            self.inner.clone(),
            state.clone(),
            catalog,
            moniker,
            Arc::from(symbol.trim()),
        )
        .await;

        match &resolution {
            Resolution::Found(assembly) => {
                info!("Resolved {} from {} to {}", symbol, root, assembly)
            }
            Resolution::NotFound => info!(
                "{} not found from {} after visiting {} package(s)",
                symbol,
                root,
                state.visited_count()
            ),
            Resolution::Failed(failures) => warn!(
                "{} not found from {}; {} dependency fetch(es) failed",
                symbol,
                root,
                failures.len()
            ),
        }

        if !matches!(resolution, Resolution::Failed(_)) {
            self.inner.resolutions.insert(key, resolution.clone());
        }
        resolution
    }

    pub fn purge_expired(&self) {
        self.inner.resolutions.purge_expired();
    }
}

fn search_framework(
    inner: Arc<ResolverInner>,
    state: Arc<SearchState>,
    catalog: Arc<PackageCatalog>,
    moniker: String,
    symbol: Arc<str>,
) -> BoxFuture<'static, Resolution> {
    async move {
        let Some(framework) = catalog.select_framework(&moniker) else {
            debug!("{} has no framework usable by {}", catalog.identity, moniker);
            return Resolution::NotFound;
        };

        if let Some(assembly) = framework.find_assembly(&symbol) {
            state.set_found();
            return Resolution::Found(AssemblyRef::new(&catalog, framework, assembly));
        }

        if state.is_found() {
            return Resolution::NotFound;
        }

        let mut branches: FuturesUnordered<_> = inner
            .search_order(&framework.dependencies)
            .into_iter()
            .map(|dependency| {
                tokio::spawn(search_dependency(
                    inner.clone(),
                    state.clone(),
                    dependency,
                    moniker.clone(),
                    symbol.clone(),
                ))
            })
            .collect();

        let mut failures = Vec::new();
        while let Some(joined) = branches.next().await {
            match joined {
                // Dropping the remaining handles detaches those tasks
                Ok(Resolution::Found(assembly)) => return Resolution::Found(assembly),
                Ok(Resolution::Failed(branch_failures)) => failures.extend(branch_failures),
                Ok(Resolution::NotFound) => {}
                Err(e) => warn!("Dependency search task of {} failed: {}", catalog.identity, e),
            }
        }

        if failures.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::Failed(failures)
        }
    }
    .boxed()
}

async fn search_dependency(
    inner: Arc<ResolverInner>,
    state: Arc<SearchState>,
    dependency: DependencyRef,
    moniker: String,
    symbol: Arc<str>,
) -> Resolution {
    if state.is_found() {
        return Resolution::NotFound;
    }

    let lower_id = dependency.package_id.to_lowercase();
    if !state.mark_visited(&lower_id) {
        debug!("Skipping {}: already visited", lower_id);
        return Resolution::NotFound;
    }

    let catalog = match inner
        .provider
        .catalog(&dependency.package_id, &dependency.version_spec)
        .await
    {
        Ok(catalog) => catalog,
        Err(error) => {
            warn!("Cannot search {}: {}", lower_id, error);
            return Resolution::Failed(vec![ResolveFailure { dependency, error }]);
        }
    };

    if state.is_found() {
        return Resolution::NotFound;
    }

    search_framework(inner, state, catalog, moniker, symbol).await
}
