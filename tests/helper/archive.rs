//! Synthetic package archives

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Write a comment-less ZIP with the given (path, contents, method) entries
pub fn build_zip(files: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, contents, method) in files {
        let options = SimpleFileOptions::default().compression_method(*method);
        writer.start_file(*path, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds a `.nupkg` with a generated nuspec
pub struct NupkgBuilder {
    id: String,
    version: String,
    description: Option<String>,
    groups: Vec<(Option<String>, Vec<(String, String)>)>,
    files: Vec<(String, Vec<u8>)>,
}

impl NupkgBuilder {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            description: None,
            groups: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Dependency group; `None` writes dependencies without a group
    pub fn dependencies(
        mut self,
        target_framework: Option<&str>,
        dependencies: &[(&str, &str)],
    ) -> Self {
        self.groups.push((
            target_framework.map(str::to_string),
            dependencies
                .iter()
                .map(|(id, version)| (id.to_string(), version.to_string()))
                .collect(),
        ));
        self
    }

    pub fn file(mut self, path: &str, contents: &[u8]) -> Self {
        self.files.push((path.to_string(), contents.to_vec()));
        self
    }

    /// Assembly placeholder of `size` bytes
    pub fn assembly(self, path: &str, size: usize) -> Self {
        let contents = vec![0x4D; size];
        self.file(path, &contents)
    }

    /// XML documentation listing `types` as `T:` members
    pub fn docs(self, path: &str, types: &[&str]) -> Self {
        let members: String = types
            .iter()
            .map(|t| format!(r#"<member name="T:{}"><summary>x</summary></member>"#, t))
            .collect();
        let xml = format!(r#"<?xml version="1.0"?><doc><members>{}</members></doc>"#, members);
        self.file(path, xml.as_bytes())
    }

    fn nuspec(&self) -> String {
        let mut dependencies = String::new();
        for (framework, deps) in &self.groups {
            let entries: String = deps
                .iter()
                .map(|(id, version)| format!(r#"<dependency id="{}" version="{}" />"#, id, version))
                .collect();
            match framework {
                Some(framework) => dependencies.push_str(&format!(
                    r#"<group targetFramework="{}">{}</group>"#,
                    framework, entries
                )),
                None => dependencies.push_str(&entries),
            }
        }

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>{}</id>
    <version>{}</version>
    <authors>tests</authors>
    <description>{}</description>
    <dependencies>{}</dependencies>
  </metadata>
</package>"#,
            self.id,
            self.version,
            self.description.as_deref().unwrap_or("test package"),
            dependencies
        )
    }

    pub fn build(self) -> Vec<u8> {
        let nuspec = self.nuspec();
        let nuspec_path = format!("{}.nuspec", self.id);
        let mut files: Vec<(&str, &[u8], CompressionMethod)> =
            vec![(nuspec_path.as_str(), nuspec.as_bytes(), CompressionMethod::Deflated)];
        for (path, contents) in &self.files {
            files.push((path.as_str(), contents.as_slice(), CompressionMethod::Deflated));
        }
        build_zip(&files)
    }
}
