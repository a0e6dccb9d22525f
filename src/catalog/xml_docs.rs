//! Documented type names from compiler-generated XML documentation

use std::collections::BTreeSet;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::catalog::nuspec::{attribute, local_name, strip_bom};
use crate::error::MetadataError;

const TYPE_PREFIX: &str = "T:";

/// Collect the fully qualified names of every `T:` member
pub fn parse_documented_types(bytes: &[u8]) -> Result<BTreeSet<String>, MetadataError> {
    let text = std::str::from_utf8(strip_bom(bytes)).map_err(|_| MetadataError::Encoding)?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut types = BTreeSet::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(&e) == "member" => {
                if let Some(name) = attribute(&e, "name")?
                    && let Some(type_name) = name.strip_prefix(TYPE_PREFIX)
                {
                    // Generic arity suffix: List`1
                    let type_name = type_name.split('`').next().unwrap_or(type_name);
                    types.insert(type_name.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(types)
}

/// Match `symbol` against a documented type set.
///
/// A fully qualified symbol must match exactly, a simple name matches the
/// last segment of any documented type. Comparison ignores ASCII case.
pub fn defines_type(types: &BTreeSet<String>, symbol: &str) -> bool {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return false;
    }
    types.iter().any(|t| {
        t.eq_ignore_ascii_case(symbol)
            || (!symbol.contains('.')
                && t.rsplit(['.', '+'])
                    .next()
                    .is_some_and(|last| last.eq_ignore_ascii_case(symbol)))
    })
}
