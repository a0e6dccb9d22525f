//! Target framework monikers
//!
//! Nuspec dependency groups use long names (`.NETStandard2.0`), archive paths
//! use short monikers (`netstandard2.0`, `net45`). Everything is normalized to
//! the short lowercase form.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

/// Moniker for assemblies and dependencies that are not framework specific
pub const ANY_FRAMEWORK: &str = "any";

static LONG_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.net(standard|coreapp|framework)?\s*(?:,\s*version\s*=\s*)?v?(\d+(?:\.\d+)*)$")
        .expect("valid regex")
});

static SHORT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(netstandard|netcoreapp|net)(\d+(?:\.\d+)*)(?:-[a-z0-9.]+)?$")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkFamily {
    NetStandard,
    /// .NET Core and .NET 5+
    NetCore,
    NetFramework,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkName {
    pub family: FrameworkFamily,
    pub version: Vec<u32>,
}

impl FrameworkName {
    /// Parse a short moniker such as `netstandard2.0`, `net472` or `net8.0`
    pub fn parse(moniker: &str) -> Option<Self> {
        let caps = SHORT_NAME.captures(moniker)?;
        let digits = &caps[2];

        let (family, version) = match &caps[1] {
            "netstandard" => (FrameworkFamily::NetStandard, dotted(digits)?),
            "netcoreapp" => (FrameworkFamily::NetCore, dotted(digits)?),
            // net5.0 and later always carry a dot; net45 style never does
            _ if digits.contains('.') => (FrameworkFamily::NetCore, dotted(digits)?),
            _ => (
                FrameworkFamily::NetFramework,
                digits
                    .chars()
                    .map(|c| c.to_digit(10))
                    .collect::<Option<Vec<_>>>()?,
            ),
        };

        Some(Self { family, version })
    }

    fn compare_version(&self, other: &Self) -> Ordering {
        let len = self.version.len().max(other.version.len());
        (0..len)
            .map(|i| {
                let a = self.version.get(i).copied().unwrap_or(0);
                let b = other.version.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

fn dotted(digits: &str) -> Option<Vec<u32>> {
    digits.split('.').map(|p| p.parse().ok()).collect()
}

fn major_version(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .and_then(|m| m.parse().ok())
        .unwrap_or(0)
}

/// Normalize any framework spelling to a lowercase short moniker
pub fn normalize_framework(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return ANY_FRAMEWORK.to_string();
    }

    let Some(caps) = LONG_NAME.captures(&lower) else {
        return lower;
    };
    let version = &caps[2];

    match caps.get(1).map(|m| m.as_str()) {
        Some("standard") => format!("netstandard{}", version),
        // .NETCoreApp5.0 and later are spelled net5.0
        Some("coreapp") if major_version(version) >= 5 => format!("net{}", version),
        Some("coreapp") => format!("netcoreapp{}", version),
        None if major_version(version) >= 5 => format!("net{}", version),
        _ => format!("net{}", version.replace('.', "")),
    }
}

/// Pick the framework closest to `wanted` among `available`.
///
/// Preference: exact match, then the highest version of the same family not
/// above `wanted`, then the highest .NET Standard profile usable by `wanted`,
/// then the framework-neutral `any`, then whatever comes first.
pub fn select_framework<'a, I>(available: I, wanted: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let available: Vec<&'a str> = available.into_iter().collect();
    let wanted = normalize_framework(wanted);

    if let Some(exact) = available.iter().copied().find(|m| *m == wanted) {
        return Some(exact);
    }

    let parsed: Vec<(&'a str, FrameworkName)> = available
        .iter()
        .filter_map(|m| FrameworkName::parse(m).map(|f| (*m, f)))
        .collect();

    if let Some(target) = FrameworkName::parse(&wanted) {
        let same_family = parsed
            .iter()
            .filter(|(_, f)| f.family == target.family && f.compare_version(&target).is_le())
            .max_by(|(_, a), (_, b)| a.compare_version(b));
        if let Some((moniker, _)) = same_family {
            return Some(*moniker);
        }

        let standard = parsed
            .iter()
            .filter(|(_, f)| f.family == FrameworkFamily::NetStandard)
            .filter(|(_, f)| {
                target.family != FrameworkFamily::NetStandard || f.compare_version(&target).is_le()
            })
            .max_by(|(_, a), (_, b)| a.compare_version(b));
        if let Some((moniker, _)) = standard {
            return Some(*moniker);
        }
    } else if let Some((moniker, _)) = parsed
        .iter()
        .filter(|(_, f)| f.family == FrameworkFamily::NetStandard)
        .max_by(|(_, a), (_, b)| a.compare_version(b))
    {
        return Some(*moniker);
    }

    if let Some(any) = available.iter().copied().find(|m| *m == ANY_FRAMEWORK) {
        return Some(any);
    }

    available.first().copied()
}
