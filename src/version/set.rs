//! Published versions of one package and version request resolution

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{AllSourcesFailed, SourceError};
use crate::source::failover::PackageSourceFailover;
use crate::version::nuget::Version;

/// Ascending list of the versions a package has published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSet {
    lower_id: String,
    versions: Vec<Version>,
}

impl VersionSet {
    /// Build a set from raw version strings.
    ///
    /// Unparseable strings are skipped, duplicates (compared
    /// case-insensitively) are dropped and the result is sorted ascending.
    pub fn new<I, S>(package_id: &str, raw_versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut versions = Vec::new();

        for raw in raw_versions {
            let raw = raw.as_ref().trim();
            if !seen.insert(raw.to_ascii_lowercase()) {
                continue;
            }
            match Version::parse(raw) {
                Ok(version) => versions.push(version),
                Err(e) => debug!("Skipping {}: {}", raw, e),
            }
        }

        versions.sort();

        Self {
            lower_id: package_id.trim().to_lowercase(),
            versions,
        }
    }

    /// Fetch the listing from the first source that has any versions.
    ///
    /// Sources that answer with an empty listing count as failures for the
    /// purpose of failover; if every source merely had nothing to list, the
    /// result is an empty set rather than an error.
    pub async fn fetch(
        failover: &PackageSourceFailover,
        package_id: &str,
    ) -> Result<Self, AllSourcesFailed> {
        let lower_id = package_id.trim().to_lowercase();
        let operation = format!("fetch versions of {}", lower_id);

        let result = failover
            .first_success(&operation, |registry| {
                let lower_id = lower_id.clone();
                async move {
                    let versions = registry.fetch_versions(&lower_id).await?;
                    if versions.is_empty() {
                        return Err(SourceError::NoVersions(lower_id));
                    }
                    Ok(versions)
                }
            })
            .await;

        match result {
            Ok(raw) => {
                let set = Self::new(&lower_id, raw);
                info!("Fetched {} versions of {}", set.len(), lower_id);
                Ok(set)
            }
            Err(e) if e.only_missing_versions() => {
                warn!("No source lists any versions of {}", lower_id);
                Ok(Self::new(&lower_id, Vec::<String>::new()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn lower_id(&self) -> &str {
        &self.lower_id
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    pub fn latest_release(&self) -> Option<&Version> {
        self.versions.iter().rev().find(|v| !v.is_prerelease())
    }

    /// Resolve a version request to a concrete version.
    ///
    /// - an empty request picks the latest release (latest of any kind when
    ///   only prereleases exist)
    /// - a listed version string matches exactly, ignoring case
    /// - a bracketed range picks the lowest listed version it admits
    /// - a version equal to a listed one after normalization (`1.0` vs
    ///   `1.0.0`) matches that one
    /// - anything else becomes a placeholder carrying the requested text
    pub fn resolve(&self, request: &str) -> Version {
        let request = request.trim();

        if request.is_empty() {
            return self
                .latest_release()
                .or_else(|| self.latest())
                .cloned()
                .unwrap_or_else(|| Version::placeholder(request));
        }

        if let Some(exact) = self
            .versions
            .iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(request))
        {
            return exact.clone();
        }

        if let Some(range) = VersionRange::parse(request) {
            if let Some(lowest) = self.versions.iter().find(|v| range.admits(v)) {
                return lowest.clone();
            }
            return Version::placeholder(range.lower_bound_text().unwrap_or(request));
        }

        if let Ok(parsed) = Version::parse(request)
            && let Some(equal) = self.versions.iter().find(|v| **v == parsed)
        {
            return equal.clone();
        }

        Version::placeholder(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    text: String,
    inclusive: bool,
}

/// Interval notation such as `[1.0, 2.0)`, `(, 3.0]` or `[1.2.3]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionRange {
    min: Option<Bound>,
    max: Option<Bound>,
}

impl VersionRange {
    fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let open = spec.chars().next()?;
        let close = spec.chars().last()?;
        if !matches!(open, '[' | '(') || !matches!(close, ']' | ')') || spec.len() < 2 {
            return None;
        }

        let inner = &spec[1..spec.len() - 1];
        let bound = |text: &str, inclusive: bool| -> Option<Option<Bound>> {
            let text = text.trim();
            if text.is_empty() {
                return Some(None);
            }
            let version = Version::parse(text).ok()?;
            Some(Some(Bound {
                version,
                text: text.to_string(),
                inclusive,
            }))
        };

        match inner.split_once(',') {
            Some((lo, hi)) => Some(Self {
                min: bound(lo, open == '[')?,
                max: bound(hi, close == ']')?,
            }),
            None => {
                // `[1.2.3]` pins an exact version
                let pinned = bound(inner, true)?;
                Some(Self {
                    min: pinned.clone(),
                    max: pinned,
                })
            }
        }
    }

    fn admits(&self, version: &Version) -> bool {
        let above_min = self.min.as_ref().is_none_or(|b| {
            if b.inclusive {
                *version >= b.version
            } else {
                *version > b.version
            }
        });
        let below_max = self.max.as_ref().is_none_or(|b| {
            if b.inclusive {
                *version <= b.version
            } else {
                *version < b.version
            }
        });
        above_min && below_max
    }

    fn lower_bound_text(&self) -> Option<&str> {
        self.min.as_ref().map(|b| b.text.as_str())
    }
}
