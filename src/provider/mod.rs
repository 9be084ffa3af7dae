//! Package record providers.
//!
//! A provider enumerates the packages installed in some environment and
//! returns one [`PackageRecord`] per distribution. All I/O of a run happens
//! here; everything downstream works on the materialized list.

pub mod metadata;
pub mod site_packages;

use anyhow::Result;

use crate::models::PackageRecord;

pub trait PackageProvider {
    fn packages(&self) -> Result<Vec<PackageRecord>>;
}

/// Canonical package name: lowercase, with runs of `-`, `_`, `.` folded to `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    out
}
