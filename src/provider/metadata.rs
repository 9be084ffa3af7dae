use anyhow::Result;
use serde::Deserialize;

/// Source label for distributions installed from the default index.
pub const SOURCE_PYPI: &str = "pypi";
/// Source label when the origin record exists but cannot be read.
pub const SOURCE_UNKNOWN: &str = "unknown";

/// `License` field values that carry no information.
const PLACEHOLDER_LICENSES: &[&str] = &["UNKNOWN", "Other/Proprietary", "None"];

/// Header fields of a core-metadata file (`METADATA` / `PKG-INFO`).
#[derive(Debug, Default, PartialEq)]
pub struct DistMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub license_expression: Option<String>,
    pub license: Option<String>,
    pub classifiers: Vec<String>,
}

impl DistMetadata {
    fn apply(&mut self, key: &str, value: String) {
        match key.to_ascii_lowercase().as_str() {
            "name" => self.name = Some(value),
            "version" => self.version = Some(value),
            "license-expression" => self.license_expression = Some(value),
            "license" => self.license = Some(value),
            "classifier" => self.classifiers.push(value),
            _ => {}
        }
    }

    /// License declarations in priority order: `License-Expression`,
    /// `License`, then `License ::` classifiers.
    pub fn raw_license_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();

        if let Some(expr) = self.license_expression.as_deref().map(str::trim) {
            if !expr.is_empty() {
                fields.push(expr.to_string());
            }
        }

        if let Some(license) = self.license.as_deref().map(str::trim) {
            if !license.is_empty() && !PLACEHOLDER_LICENSES.contains(&license) {
                fields.push(license.to_string());
            }
        }

        fields.extend(
            self.classifiers
                .iter()
                .filter(|c| c.starts_with("License ::"))
                .cloned(),
        );

        fields
    }
}

/// Parse the RFC 822-style header block of a core-metadata file.
///
/// Parsing stops at the first empty line; the description body is ignored.
/// Continuation lines (leading whitespace, optionally `|`) are folded into
/// the previous field.
pub fn parse_metadata(content: &str) -> DistMetadata {
    let mut meta = DistMetadata::default();
    let mut current: Option<(String, String)> = None;

    for line in content.lines() {
        if line.is_empty() {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = current.as_mut() {
                let continued = line.trim().trim_start_matches('|').trim();
                if !continued.is_empty() {
                    value.push('\n');
                    value.push_str(continued);
                }
            }
            continue;
        }

        if let Some((key, value)) = current.take() {
            meta.apply(&key, value);
        }
        if let Some((key, value)) = line.split_once(':') {
            current = Some((key.trim().to_string(), value.trim().to_string()));
        }
    }

    if let Some((key, value)) = current.take() {
        meta.apply(&key, value);
    }

    meta
}

/// `direct_url.json`, written by installers for non-index installs.
#[derive(Debug, Deserialize)]
struct DirectUrl {
    url: String,
    #[serde(default)]
    vcs_info: Option<VcsInfo>,
}

#[derive(Debug, Deserialize)]
struct VcsInfo {
    vcs: String,
    #[serde(default)]
    commit_id: Option<String>,
    #[serde(default)]
    requested_revision: Option<String>,
}

/// Source label derived from a `direct_url.json` document.
///
/// VCS installs become `<vcs>+<url>@<ref>`; file and archive URLs are
/// returned as-is.
pub fn source_from_direct_url(content: &str) -> Result<String> {
    let direct: DirectUrl = serde_json::from_str(content)?;
    let url = direct.url.trim().to_string();

    if let Some(vcs) = direct.vcs_info {
        let base = if url.starts_with(&format!("{}+", vcs.vcs)) {
            url
        } else {
            format!("{}+{}", vcs.vcs, url)
        };
        let reference = vcs.commit_id.or(vcs.requested_revision);
        return Ok(match reference {
            Some(r) if !r.is_empty() => format!("{base}@{r}"),
            _ => base,
        });
    }

    if url.is_empty() {
        return Ok(SOURCE_PYPI.to_string());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = "Metadata-Version: 2.1
Name: Requests
Version: 2.31.0
Summary: Python HTTP for Humans.
License: Apache 2.0
Classifier: Development Status :: 5 - Production/Stable
Classifier: License :: OSI Approved :: Apache Software License
Classifier: Programming Language :: Python :: 3

Requests is an elegant and simple HTTP library.
License: this line is part of the body
";

    #[test]
    fn test_parse_metadata_headers() {
        let meta = parse_metadata(METADATA);
        assert_eq!(meta.name.as_deref(), Some("Requests"));
        assert_eq!(meta.version.as_deref(), Some("2.31.0"));
        assert_eq!(meta.license.as_deref(), Some("Apache 2.0"));
        assert_eq!(meta.classifiers.len(), 3);
    }

    #[test]
    fn test_raw_license_fields_order() {
        let meta = parse_metadata(METADATA);
        assert_eq!(
            meta.raw_license_fields(),
            vec![
                "Apache 2.0".to_string(),
                "License :: OSI Approved :: Apache Software License".to_string(),
            ]
        );
    }

    #[test]
    fn test_license_expression_comes_first_and_placeholders_are_dropped() {
        let meta = parse_metadata(
            "Name: foo\nVersion: 1.0\nLicense: UNKNOWN\nLicense-Expression: MIT OR Apache-2.0\n",
        );
        assert_eq!(meta.raw_license_fields(), vec!["MIT OR Apache-2.0".to_string()]);
    }

    #[test]
    fn test_continuation_lines_are_folded() {
        let meta = parse_metadata(
            "Name: foo\nLicense: Copyright (c) 2020 Foo\n        |\n        | Permission is hereby granted\nVersion: 1.0\n",
        );
        assert_eq!(
            meta.license.as_deref(),
            Some("Copyright (c) 2020 Foo\nPermission is hereby granted")
        );
        assert_eq!(meta.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_no_license_fields() {
        let meta = parse_metadata("Name: bar\nVersion: 2.0\n");
        assert!(meta.raw_license_fields().is_empty());
    }

    #[test]
    fn test_source_from_vcs_install() {
        let json = r#"{"url": "https://github.com/org/repo.git",
                       "vcs_info": {"vcs": "git", "commit_id": "abc123"}}"#;
        assert_eq!(
            source_from_direct_url(json).unwrap(),
            "git+https://github.com/org/repo.git@abc123"
        );
    }

    #[test]
    fn test_source_from_local_and_archive_installs() {
        let local = r#"{"url": "file:///home/me/src/pkg", "dir_info": {"editable": true}}"#;
        assert_eq!(source_from_direct_url(local).unwrap(), "file:///home/me/src/pkg");

        let archive = r#"{"url": "https://mirror.example.com/pkg-1.0.tar.gz", "archive_info": {}}"#;
        assert_eq!(
            source_from_direct_url(archive).unwrap(),
            "https://mirror.example.com/pkg-1.0.tar.gz"
        );
    }

    #[test]
    fn test_malformed_direct_url_is_an_error() {
        assert!(source_from_direct_url("{not json").is_err());
    }
}
