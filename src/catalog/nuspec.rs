//! Nuspec manifest parsing

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::catalog::framework::{ANY_FRAMEWORK, normalize_framework};
use crate::catalog::{DependencyRef, PackageMetadata, Repository};
use crate::error::MetadataError;

/// Dependencies declared for one target framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    /// Normalized moniker, `any` for ungrouped dependencies
    pub target_framework: String,
    pub dependencies: Vec<DependencyRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nuspec {
    pub metadata: PackageMetadata,
    pub dependency_groups: Vec<DependencyGroup>,
}

pub(crate) fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

pub(crate) fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, MetadataError> {
    match e.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.trim().to_string())),
        None => Ok(None),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

struct NuspecBuilder {
    nuspec: Nuspec,
    path: Vec<String>,
    current_group: Option<usize>,
    license_type: Option<String>,
}

impl NuspecBuilder {
    fn parent(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    fn in_metadata(&self) -> bool {
        self.path.len() >= 2 && self.path[self.path.len() - 2] == "metadata"
    }

    fn ungrouped(&mut self) -> usize {
        let groups = &mut self.nuspec.dependency_groups;
        if let Some(i) = groups
            .iter()
            .position(|g| g.target_framework == ANY_FRAMEWORK)
        {
            return i;
        }
        groups.push(DependencyGroup {
            target_framework: ANY_FRAMEWORK.to_string(),
            dependencies: Vec::new(),
        });
        groups.len() - 1
    }

    fn open(&mut self, e: &BytesStart<'_>, name: &str) -> Result<(), MetadataError> {
        let parent = self.parent().map(str::to_string);
        match (name, parent.as_deref()) {
            ("repository", Some("metadata")) => {
                self.nuspec.metadata.repository = Some(Repository {
                    kind: attribute(e, "type")?,
                    url: attribute(e, "url")?,
                    commit: attribute(e, "commit")?,
                });
            }
            ("license", Some("metadata")) => {
                self.license_type = attribute(e, "type")?;
            }
            ("group", Some("dependencies")) => {
                let target_framework = attribute(e, "targetFramework")?
                    .map(|tf| normalize_framework(&tf))
                    .unwrap_or_else(|| ANY_FRAMEWORK.to_string());
                self.nuspec.dependency_groups.push(DependencyGroup {
                    target_framework,
                    dependencies: Vec::new(),
                });
                self.current_group = Some(self.nuspec.dependency_groups.len() - 1);
            }
            ("dependency", Some("dependencies" | "group")) => {
                let Some(package_id) = attribute(e, "id")? else {
                    return Ok(());
                };
                let version_spec =
                    attribute(e, "version")?.unwrap_or_else(|| "0".to_string());
                let index = match (parent.as_deref(), self.current_group) {
                    (Some("group"), Some(i)) => i,
                    _ => self.ungrouped(),
                };
                self.nuspec.dependency_groups[index]
                    .dependencies
                    .push(DependencyRef {
                        package_id,
                        version_spec,
                    });
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, value: String) {
        if !self.in_metadata() {
            return;
        }
        let Some(field) = self.path.last() else {
            return;
        };
        let metadata = &mut self.nuspec.metadata;
        match field.as_str() {
            "id" => metadata.id = non_empty(value),
            "version" => metadata.version = non_empty(value),
            "title" => metadata.title = non_empty(value),
            "authors" => metadata.authors = non_empty(value),
            "owners" => metadata.owners = non_empty(value),
            "description" => metadata.description = non_empty(value),
            "summary" => metadata.summary = non_empty(value),
            "projectUrl" => metadata.project_url = non_empty(value),
            "licenseUrl" => metadata.license_url = non_empty(value),
            "iconUrl" => metadata.icon_url = non_empty(value),
            "copyright" => metadata.copyright = non_empty(value),
            "tags" => {
                metadata.tags = value.split_whitespace().map(str::to_string).collect();
            }
            "license" if self.license_type.as_deref() == Some("expression") => {
                metadata.license_expression = non_empty(value);
            }
            _ => {}
        }
    }
}

/// Parse a nuspec document
pub fn parse_nuspec(bytes: &[u8]) -> Result<Nuspec, MetadataError> {
    let text = std::str::from_utf8(strip_bom(bytes)).map_err(|_| MetadataError::Encoding)?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut builder = NuspecBuilder {
        nuspec: Nuspec::default(),
        path: Vec::new(),
        current_group: None,
        license_type: None,
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                builder.open(&e, &name)?;
                builder.path.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                builder.open(&e, &name)?;
                if name == "group" {
                    builder.current_group = None;
                }
            }
            Event::End(_) => {
                if builder.path.pop().as_deref() == Some("group") {
                    builder.current_group = None;
                }
            }
            Event::Text(t) => builder.text(t.unescape()?.trim().to_string()),
            Event::CData(c) => {
                builder.text(String::from_utf8_lossy(&c.into_inner()).trim().to_string())
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(builder.nuspec)
}
