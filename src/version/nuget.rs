//! NuGet-style package versions
//!
//! Up to four numeric components, an optional prerelease label and optional
//! build metadata. Build metadata is kept for display only.

use std::cmp::Ordering;
use std::fmt;

use semver::Prerelease;

use crate::error::VersionParseError;

#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: u64,
    pub prerelease: Option<String>,
    pub build_metadata: Option<String>,
    original: String,
}

impl Version {
    /// Parse a version string such as `1.2`, `1.2.3.4` or `2.0.0-beta1+sha.1`
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        let err = || VersionParseError(input.to_string());

        let (rest, build_metadata) = match trimmed.split_once('+') {
            Some((rest, meta)) if !meta.is_empty() => (rest, Some(meta.to_string())),
            Some(_) => return Err(err()),
            None => (trimmed, None),
        };

        let (numbers, prerelease) = match rest.split_once('-') {
            Some((numbers, pre)) if !pre.is_empty() => (numbers, Some(pre.to_string())),
            Some(_) => return Err(err()),
            None => (rest, None),
        };

        let parts = numbers
            .split('.')
            .map(|p| p.parse::<u64>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;

        if parts.is_empty() || parts.len() > 4 {
            return Err(err());
        }

        let part = |i: usize| parts.get(i).copied().unwrap_or(0);

        Ok(Self {
            major: part(0),
            minor: part(1),
            patch: part(2),
            revision: part(3),
            prerelease,
            build_metadata,
            original: trimmed.to_string(),
        })
    }

    /// Version standing in for a requested version that is not listed.
    ///
    /// Keeps the requested text so that download URLs use it verbatim; an
    /// empty request becomes `0`.
    pub fn placeholder(requested: &str) -> Self {
        let requested = requested.trim();
        let text = if requested.is_empty() { "0" } else { requested };
        Self::parse(text).unwrap_or_else(|_| Self {
            major: 0,
            minor: 0,
            patch: 0,
            revision: 0,
            prerelease: None,
            build_metadata: None,
            original: text.to_string(),
        })
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The version text as published
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Canonical form: three components (four when revision is set),
    /// lowercase prerelease, no build metadata
    pub fn normalized(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision != 0 {
            out.push_str(&format!(".{}", self.revision));
        }
        if let Some(pre) = &self.prerelease {
            out.push('-');
            out.push_str(&pre.to_ascii_lowercase());
        }
        out
    }

    /// Version text used in download URLs: the normalized form, or the
    /// lowercased text of a placeholder that does not parse
    pub fn download_text(&self) -> String {
        match Self::parse(&self.original) {
            Ok(_) => self.normalized(),
            Err(_) => self.original.to_lowercase(),
        }
    }
}

/// Prerelease labels compare case-insensitively with semver precedence,
/// falling back to ordinal comparison for labels semver rejects
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    match (Prerelease::new(&a), Prerelease::new(&b)) {
        (Ok(pa), Ok(pb)) => pa.cmp(&pb),
        _ => a.cmp(&b),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision)
            .cmp(&(other.major, other.minor, other.patch, other.revision))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // Release sorts after any prerelease
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
