use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use super::metadata::{parse_metadata, source_from_direct_url, SOURCE_PYPI, SOURCE_UNKNOWN};
use super::{normalize_name, PackageProvider};
use crate::detector::site_packages_dirs;
use crate::models::PackageRecord;

/// Provider reading installed distributions from `site-packages` directories.
///
/// Understands `*.dist-info` (wheels, modern installers) and `*.egg-info`
/// (legacy setuptools, either a directory or a bare `PKG-INFO` file).
/// Records are returned sorted by normalized name; when the same name
/// appears twice, the first directory wins.
pub struct SitePackagesProvider {
    dirs: Vec<PathBuf>,
}

impl SitePackagesProvider {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Provider for every `site-packages` directory of the environment at `env`.
    pub fn for_environment(env: &Path) -> Result<Self> {
        let dirs = site_packages_dirs(env);
        if dirs.is_empty() {
            bail!("No site-packages directory found under {}", env.display());
        }
        for dir in &dirs {
            debug!(path = %dir.display(), "using site-packages");
        }
        Ok(Self::new(dirs))
    }
}

impl PackageProvider for SitePackagesProvider {
    fn packages(&self) -> Result<Vec<PackageRecord>> {
        let mut records = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for dir in &self.dirs {
            let mut entries: Vec<PathBuf> = fs::read_dir(dir)
                .with_context(|| format!("Failed to read {}", dir.display()))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .collect();
            entries.sort();

            for path in entries {
                match read_distribution(&path) {
                    Ok(Some(record)) => {
                        if seen.insert(record.name.clone()) {
                            records.push(record);
                        } else {
                            debug!(name = %record.name, path = %path.display(), "duplicate distribution skipped");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(path = %path.display(), "skipping unreadable distribution: {err:#}"),
                }
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

/// Read one `site-packages` entry. `Ok(None)` for entries that are not
/// distribution metadata or carry no name.
fn read_distribution(path: &Path) -> Result<Option<PackageRecord>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let (metadata_path, direct_url_path) = if file_name.ends_with(".dist-info") {
        (path.join("METADATA"), Some(path.join("direct_url.json")))
    } else if file_name.ends_with(".egg-info") {
        if path.is_dir() {
            (path.join("PKG-INFO"), None)
        } else {
            (path.to_path_buf(), None)
        }
    } else {
        return Ok(None);
    };

    // Legacy egg-info is often Latin-1; a bad byte must not hide the package.
    let bytes = fs::read(&metadata_path)
        .with_context(|| format!("Failed to read {}", metadata_path.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    let meta = parse_metadata(&content);

    let Some(name) = meta.name.as_deref().filter(|n| !n.trim().is_empty()) else {
        debug!(path = %path.display(), "metadata without Name, skipped");
        return Ok(None);
    };

    let source = match direct_url_path {
        Some(p) if p.is_file() => read_source(&p),
        _ => SOURCE_PYPI.to_string(),
    };

    Ok(Some(PackageRecord::new(
        normalize_name(name),
        meta.version.clone().unwrap_or_default(),
        meta.raw_license_fields(),
        source,
    )))
}

fn read_source(path: &Path) -> String {
    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| source_from_direct_url(&content));
    match parsed {
        Ok(source) => source,
        Err(err) => {
            warn!(path = %path.display(), "unreadable direct_url.json: {err:#}");
            SOURCE_UNKNOWN.to_string()
        }
    }
}
