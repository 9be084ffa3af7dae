use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::debug;

/// Files whose presence marks a project root.
pub const ROOT_MARKERS: &[&str] = &["pyproject.toml", "setup.py", "setup.cfg", ".git"];

/// Walk up from `start` to the first directory containing a root marker.
/// Falls back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .unwrap_or(start)
        .to_path_buf()
}

/// Locate the Python environment to inspect, searching in order:
///
/// 1. `explicit`: path passed via `--env`
/// 2. `$VIRTUAL_ENV`
/// 3. `<project_root>/.venv`
pub fn detect_environment(explicit: Option<&Path>, project_root: &Path) -> Result<PathBuf> {
    let virtual_env = std::env::var_os("VIRTUAL_ENV").map(PathBuf::from);
    resolve_environment(explicit, virtual_env, project_root)
}

fn resolve_environment(
    explicit: Option<&Path>,
    virtual_env: Option<PathBuf>,
    project_root: &Path,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_dir() {
            bail!("Environment path {} is not a directory", path.display());
        }
        return Ok(path.to_path_buf());
    }

    if let Some(venv) = virtual_env.filter(|p| p.is_dir()) {
        debug!(path = %venv.display(), "using $VIRTUAL_ENV");
        return Ok(venv);
    }

    let local = project_root.join(".venv");
    if local.is_dir() {
        debug!(path = %local.display(), "using project .venv");
        return Ok(local);
    }

    bail!(
        "Not inside a virtual environment. Activate one, create {}, or pass --env <path>.",
        local.display()
    )
}

/// `site-packages` directories of the environment at `env`.
///
/// `env` may also point directly at a `site-packages` directory.
pub fn site_packages_dirs(env: &Path) -> Vec<PathBuf> {
    if env.file_name().is_some_and(|n| n == "site-packages") {
        return vec![env.to_path_buf()];
    }

    let mut candidates = Vec::new();

    for lib in ["lib", "lib64"] {
        let Ok(entries) = std::fs::read_dir(env.join(lib)) else {
            continue;
        };
        let mut pythons: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("python"))
            .map(|e| e.path().join("site-packages"))
            .collect();
        pythons.sort();
        candidates.extend(pythons);
    }

    // Windows layout
    candidates.push(env.join("Lib").join("site-packages"));

    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();
    for dir in candidates.into_iter().filter(|d| d.is_dir()) {
        // lib64 is commonly a symlink to lib
        let key = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        if !seen.contains(&key) {
            seen.push(key);
            dirs.push(dir);
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_project_root_walks_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("pyproject.toml"), "").unwrap();
        let nested = tmp.path().join("src").join("pkg");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), tmp.path());
    }

    #[test]
    fn test_resolve_environment_order() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("explicit");
        let venv = tmp.path().join("active");
        fs::create_dir_all(&explicit).unwrap();
        fs::create_dir_all(&venv).unwrap();
        fs::create_dir_all(tmp.path().join(".venv")).unwrap();

        let got = resolve_environment(Some(&explicit), Some(venv.clone()), tmp.path()).unwrap();
        assert_eq!(got, explicit);

        let got = resolve_environment(None, Some(venv.clone()), tmp.path()).unwrap();
        assert_eq!(got, venv);

        let got = resolve_environment(None, None, tmp.path()).unwrap();
        assert_eq!(got, tmp.path().join(".venv"));
    }

    #[test]
    fn test_resolve_environment_fails_outside_venv() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_environment(None, None, tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Not inside a virtual environment"));

        let missing = tmp.path().join("missing");
        assert!(resolve_environment(Some(&missing), None, tmp.path()).is_err());
    }

    #[test]
    fn test_site_packages_dirs_unix_layout() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().join("lib").join("python3.11").join("site-packages");
        fs::create_dir_all(&site).unwrap();

        assert_eq!(site_packages_dirs(tmp.path()), vec![site.clone()]);
        assert_eq!(site_packages_dirs(&site), vec![site]);
    }

    #[test]
    fn test_site_packages_dirs_empty_env() {
        let tmp = TempDir::new().unwrap();
        assert!(site_packages_dirs(tmp.path()).is_empty());
    }
}
