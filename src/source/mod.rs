//! Package sources: mirror configuration, registries and failover
//!
//! - [`registry`]: trait for listing versions and locating archives
//! - [`nuget`]: NuGet v3 registration index implementation
//! - [`failover`]: ordered try-until-success across sources

pub mod failover;
pub mod nuget;
pub mod registry;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

/// Characters left unescaped in template arguments (RFC 3986 unreserved)
const TEMPLATE_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// One configured mirror
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageSource {
    pub domain_url: String,
    pub display_name: String,
    pub display_url: String,
    /// `{0}` is the lowercase package id
    pub versions_url_format: String,
    /// `{0}` is the lowercase package id, `{1}` the version
    pub download_url_format: String,
}

impl PackageSource {
    pub fn nuget_org() -> Self {
        Self {
            domain_url: "https://www.nuget.org".to_string(),
            display_name: "NuGet Gallery".to_string(),
            display_url: "nuget.org".to_string(),
            versions_url_format: "https://api.nuget.org/v3/registration5-semver1/{0}/index.json"
                .to_string(),
            download_url_format:
                "https://api.nuget.org/v3-flatcontainer/{0}/{1}/{0}.{1}.nupkg".to_string(),
        }
    }

    pub fn versions_url(&self, lower_id: &str) -> String {
        format_template(&self.versions_url_format, &[lower_id])
    }

    pub fn download_url(&self, lower_id: &str, version: &str) -> String {
        format_template(&self.download_url_format, &[lower_id, version])
    }
}

/// Substitute `{0}`, `{1}`, ... with URL-escaped arguments
pub fn format_template(template: &str, args: &[&str]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |acc, (i, arg)| {
            let escaped = utf8_percent_encode(arg, TEMPLATE_ESCAPE).to_string();
            acc.replace(&format!("{{{}}}", i), &escaped)
        })
}
