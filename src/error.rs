use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive format error: {0}")]
    Format(String),

    #[error("Unsupported compression method {method} for {path}")]
    UnsupportedCompression { method: u16, path: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure to read package metadata XML (nuspec, documentation files)
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("XML is not valid UTF-8")]
    Encoding,
}

/// Error raised by a single package source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("No versions listed for {0}")]
    NoVersions(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
#[error("{source_name}: {error}")]
pub struct SourceFailure {
    pub source_name: String,
    pub error: SourceError,
}

/// Aggregate of every configured source's failure for one operation
#[derive(Debug, Error)]
#[error("Every package source failed to {operation}: {}", describe(.failures))]
pub struct AllSourcesFailed {
    pub operation: String,
    pub failures: Vec<SourceFailure>,
}

impl AllSourcesFailed {
    /// True when no source failed for a reason other than listing zero versions
    pub fn only_missing_versions(&self) -> bool {
        !self.failures.is_empty()
            && self
                .failures
                .iter()
                .all(|f| matches!(f.error, SourceError::NoVersions(_)))
    }
}

fn describe(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return "no sources configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid version string: {0:?}")]
pub struct VersionParseError(pub String);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
