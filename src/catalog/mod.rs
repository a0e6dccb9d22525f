//! Package catalogs built lazily from remote archives
//!
//! - [`framework`]: target framework monikers and compatibility selection
//! - [`nuspec`]: manifest parsing (metadata, dependency groups)
//! - [`xml_docs`]: documented type names from XML documentation
//! - [`repository`]: cached, failover-aware catalog and version lookups
//!
//! A catalog is built from the archive's central directory and two kinds of
//! small entries: the root `.nuspec` and, optionally, documentation XML.
//! Assembly payloads are never downloaded.

pub mod framework;
pub mod nuspec;
pub mod repository;
pub mod xml_docs;

use std::collections::BTreeSet;
use std::fmt;

use futures::future::join_all;
use indexmap::{IndexMap, IndexSet};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::archive::{ArchiveDirectory, DirectoryEntry, RemoteArchiveReader};
use crate::catalog::framework::{ANY_FRAMEWORK, normalize_framework, select_framework};
use crate::catalog::nuspec::{Nuspec, parse_nuspec};
use crate::catalog::xml_docs::{defines_type, parse_documented_types};
use crate::error::SourceError;
use crate::version::nuget::Version;

pub use repository::PackageRepository;

/// A package id paired with one concrete version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub id: String,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Key used for caching and cycle tracking
    pub fn lower_id(&self) -> String {
        self.id.to_lowercase()
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repository {
    pub kind: Option<String>,
    pub url: Option<String>,
    pub commit: Option<String>,
}

/// Descriptive nuspec fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub id: Option<String>,
    pub version: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub owners: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub project_url: Option<String>,
    pub license_url: Option<String>,
    pub license_expression: Option<String>,
    pub icon_url: Option<String>,
    pub copyright: Option<String>,
    pub tags: Vec<String>,
    pub repository: Option<Repository>,
}

impl PackageMetadata {
    pub fn authors_or_owners(&self) -> Option<&str> {
        self.authors.as_deref().or(self.owners.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyRef {
    pub package_id: String,
    /// Exact version, bracket range, or `0` when the nuspec omits it
    pub version_spec: String,
}

/// An assembly inside the archive and its optional documentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageAssembly {
    pub entry: DirectoryEntry,
    pub xml_docs: Option<DirectoryEntry>,
    pub documented_types: BTreeSet<String>,
}

impl PackageAssembly {
    pub fn file_name(&self) -> &str {
        self.entry.file_name()
    }

    /// File name without the `.dll`/`.exe` extension
    pub fn name(&self) -> &str {
        let file_name = self.file_name();
        file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name)
    }

    pub fn size_in_bytes(&self) -> u32 {
        self.entry.uncompressed_size
    }

    /// True when the assembly is named `symbol` or documents a type by that name
    pub fn defines(&self, symbol: &str) -> bool {
        self.name().eq_ignore_ascii_case(symbol) || defines_type(&self.documented_types, symbol)
    }
}

/// Assemblies and dependencies of one target framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkEntry {
    pub moniker: String,
    pub assemblies: Vec<PackageAssembly>,
    pub dependencies: IndexSet<DependencyRef>,
}

impl FrameworkEntry {
    fn new(moniker: String) -> Self {
        Self {
            moniker,
            assemblies: Vec::new(),
            dependencies: IndexSet::new(),
        }
    }

    pub fn find_assembly(&self, symbol: &str) -> Option<&PackageAssembly> {
        self.assemblies.iter().find(|a| a.defines(symbol))
    }

    /// Assembly by name, or the largest one when `name` is empty
    pub fn assembly(&self, name: &str) -> Option<&PackageAssembly> {
        if name.is_empty() {
            return self.assemblies.iter().max_by_key(|a| a.size_in_bytes());
        }
        self.assemblies.iter().find(|a| {
            a.name().eq_ignore_ascii_case(name) || a.file_name().eq_ignore_ascii_case(name)
        })
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.assemblies.iter().map(|a| a.size_in_bytes() as u64).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Download documentation XML next to each assembly
    pub load_xml_docs: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            load_xml_docs: true,
        }
    }
}

/// Everything known about one package version without downloading assemblies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCatalog {
    pub identity: PackageIdentity,
    pub archive_url: String,
    pub archive_size: u64,
    pub metadata: PackageMetadata,
    pub frameworks: IndexMap<String, FrameworkEntry>,
    pub dependencies: IndexMap<String, IndexSet<DependencyRef>>,
    pub files: Vec<DirectoryEntry>,
}

fn is_assembly_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("lib/") && (lower.ends_with(".dll") || lower.ends_with(".exe"))
}

/// `lib/<moniker>/...`, percent-decoded and lowercased; `any` for `lib/A.dll`
fn framework_moniker(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return ANY_FRAMEWORK.to_string();
    }
    let decoded = percent_decode_str(segments[1]).decode_utf8_lossy();
    let moniker = decoded.trim().to_lowercase();
    if moniker.is_empty() {
        ANY_FRAMEWORK.to_string()
    } else {
        moniker
    }
}

fn find_docs<'a>(
    directory: &'a ArchiveDirectory,
    assembly: &DirectoryEntry,
) -> Option<&'a DirectoryEntry> {
    let path = &assembly.full_path;
    let stem = &path[..path.len() - ".dll".len()];
    let docs_path = format!("{}.xml", stem);
    directory
        .entries
        .iter()
        .find(|e| e.full_path.eq_ignore_ascii_case(&docs_path))
}

/// The manifest sits at the archive root
fn find_nuspec(directory: &ArchiveDirectory) -> Option<&DirectoryEntry> {
    directory.entries.iter().find(|e| {
        !e.full_path.contains('/') && e.full_path.to_ascii_lowercase().ends_with(".nuspec")
    })
}

impl PackageCatalog {
    /// Assemble a catalog from an archive listing and its parsed manifest.
    ///
    /// Dependency-only frameworks are added when the package ships no
    /// assemblies at all, so metapackages can still be traversed.
    pub fn build(
        identity: PackageIdentity,
        directory: &ArchiveDirectory,
        nuspec: Nuspec,
    ) -> Self {
        let mut frameworks: IndexMap<String, FrameworkEntry> = IndexMap::new();
        for entry in directory.entries.iter().filter(|e| is_assembly_path(&e.full_path)) {
            let moniker = framework_moniker(&entry.full_path);
            let assembly = PackageAssembly {
                entry: entry.clone(),
                xml_docs: find_docs(directory, entry).cloned(),
                documented_types: BTreeSet::new(),
            };
            frameworks
                .entry(moniker.clone())
                .or_insert_with(|| FrameworkEntry::new(moniker))
                .assemblies
                .push(assembly);
        }

        let mut dependencies: IndexMap<String, IndexSet<DependencyRef>> = IndexMap::new();
        for group in nuspec.dependency_groups {
            dependencies
                .entry(normalize_framework(&group.target_framework))
                .or_default()
                .extend(group.dependencies);
        }

        if frameworks.is_empty() {
            for moniker in dependencies.keys() {
                frameworks.insert(moniker.clone(), FrameworkEntry::new(moniker.clone()));
            }
        }

        for framework in frameworks.values_mut() {
            let groups = dependencies.keys().map(String::as_str);
            if let Some(group) = select_framework(groups, &framework.moniker) {
                framework.dependencies = dependencies[group].clone();
            }
        }

        let identity = match &nuspec.metadata.id {
            Some(id) if id.eq_ignore_ascii_case(&identity.id) => {
                PackageIdentity::new(id.clone(), identity.version)
            }
            _ => identity,
        };

        Self {
            identity,
            archive_url: directory.url.clone(),
            archive_size: directory.length,
            metadata: nuspec.metadata,
            frameworks,
            dependencies,
            files: directory.entries.clone(),
        }
    }

    /// List the archive, read its manifest and (optionally) documentation.
    ///
    /// A missing manifest yields empty metadata; a malformed one is an error.
    /// Unreadable documentation files are logged and skipped.
    pub async fn load(
        reader: &RemoteArchiveReader,
        identity: PackageIdentity,
        url: &str,
        options: CatalogOptions,
    ) -> Result<Self, SourceError> {
        let directory = reader.list_entries(url).await?;

        let nuspec = match find_nuspec(&directory) {
            Some(entry) => {
                let bytes = reader.read_entry(url, entry).await?;
                parse_nuspec(&bytes)?
            }
            None => {
                warn!("No nuspec found in {}", url);
                Nuspec::default()
            }
        };

        let mut catalog = Self::build(identity, &directory, nuspec);
        if options.load_xml_docs {
            catalog.load_documented_types(reader).await;
        }

        debug!(
            "Built catalog for {} with {} framework(s)",
            catalog.identity,
            catalog.frameworks.len()
        );
        Ok(catalog)
    }

    async fn load_documented_types(&mut self, reader: &RemoteArchiveReader) {
        let url = self.archive_url.clone();
        let jobs: Vec<(usize, usize, DirectoryEntry)> = self
            .frameworks
            .values()
            .enumerate()
            .flat_map(|(fi, framework)| {
                framework
                    .assemblies
                    .iter()
                    .enumerate()
                    .filter_map(move |(ai, a)| a.xml_docs.clone().map(|docs| (fi, ai, docs)))
            })
            .collect();

        let results = join_all(jobs.into_iter().map(|(fi, ai, docs)| {
            let url = url.clone();
            async move {
                let result = match reader.read_entry(&url, &docs).await {
                    Ok(bytes) => parse_documented_types(&bytes).map_err(SourceError::from),
                    Err(e) => Err(SourceError::from(e)),
                };
                (fi, ai, docs.full_path, result)
            }
        }))
        .await;

        for (fi, ai, path, result) in results {
            match result {
                Ok(types) => {
                    if let Some((_, framework)) = self.frameworks.get_index_mut(fi) {
                        framework.assemblies[ai].documented_types = types;
                    }
                }
                Err(e) => warn!("Skipping documentation {}: {}", path, e),
            }
        }
    }

    /// Framework by exact moniker (any spelling), or the first one
    pub fn framework(&self, moniker: &str) -> Option<&FrameworkEntry> {
        self.frameworks
            .get(&normalize_framework(moniker))
            .or_else(|| self.frameworks.values().next())
    }

    /// Closest compatible framework for `moniker`
    pub fn select_framework(&self, moniker: &str) -> Option<&FrameworkEntry> {
        select_framework(self.frameworks.keys().map(String::as_str), moniker)
            .and_then(|selected| self.frameworks.get(selected))
    }
}
