//! Package versions and version request resolution
//!
//! - [`nuget`]: four-part versions with prerelease tags and build metadata
//! - [`set`]: the published versions of one package, fetched with failover

pub mod nuget;
pub mod set;

pub use nuget::Version;
pub use set::VersionSet;
