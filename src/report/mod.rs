//! Report renderers for package listings and check results.
//!
//! - [`terminal`]: colored, tabular output with summary box; respects `--verbose` / `--quiet`.
//! - JSON output is the serde form of [`Report`](crate::models::Report) or
//!   [`PackageListing`], printed by the caller.

pub mod terminal;

use serde::Serialize;

use crate::license::normalize::normalize;
use crate::license::table::LicenseRisk;
use crate::models::{CanonicalLicense, PackageRecord};
use crate::policy::Policy;

/// One row of `list` output.
#[derive(Debug, Clone, Serialize)]
pub struct PackageListing {
    pub name: String,
    pub version: String,
    pub license: CanonicalLicense,
    pub risk: LicenseRisk,
    pub source: String,
    pub raw_licenses: Vec<String>,
    /// The license came from a `[[licenses.clarify]]` entry.
    pub clarified: bool,
}

/// Normalize every package's license, honouring clarifications when a policy is loaded.
pub fn listings(packages: &[PackageRecord], policy: Option<&Policy>) -> Vec<PackageListing> {
    packages
        .iter()
        .map(|pkg| {
            let (declared, clarification) = match policy {
                Some(policy) => policy.declared_licenses(pkg),
                None => (pkg.raw_licenses.clone(), None),
            };
            let license = normalize(&declared);
            let risk = license
                .expr()
                .map(|expr| expr.risk())
                .unwrap_or(LicenseRisk::Unknown);
            PackageListing {
                name: pkg.name.clone(),
                version: pkg.version.clone(),
                license,
                risk,
                source: pkg.source.clone(),
                raw_licenses: pkg.raw_licenses.clone(),
                clarified: clarification.is_some(),
            }
        })
        .collect()
}
