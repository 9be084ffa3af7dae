use serde::{Deserialize, Serialize};

use crate::license::expression::LicenseExpr;

/// One installed distribution as handed over by a package provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    /// Declared license strings in provider priority order. May be empty.
    pub raw_licenses: Vec<String>,
    /// Distribution origin: `"pypi"`, an index or file URL, or a VCS reference.
    pub source: String,
}

impl PackageRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        raw_licenses: Vec<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            raw_licenses,
            source: source.into(),
        }
    }
}

/// Result of normalizing a package's declared license fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CanonicalLicense {
    /// Every part of the declaration mapped to a canonical identifier.
    Recognized { expr: LicenseExpr, raw: String },
    /// Nothing matched. `raw` is `None` when no license was declared at all.
    Unrecognized { raw: Option<String> },
}

impl CanonicalLicense {
    pub fn is_recognized(&self) -> bool {
        matches!(self, CanonicalLicense::Recognized { .. })
    }

    /// Canonical identifier (or rendered expression) when recognized.
    pub fn identifier(&self) -> Option<String> {
        match self {
            CanonicalLicense::Recognized { expr, .. } => Some(expr.to_string()),
            CanonicalLicense::Unrecognized { .. } => None,
        }
    }

    pub fn expr(&self) -> Option<&LicenseExpr> {
        match self {
            CanonicalLicense::Recognized { expr, .. } => Some(expr),
            CanonicalLicense::Unrecognized { .. } => None,
        }
    }

    /// The raw declaration this result was derived from, if any.
    pub fn raw(&self) -> Option<&str> {
        match self {
            CanonicalLicense::Recognized { raw, .. } => Some(raw),
            CanonicalLicense::Unrecognized { raw } => raw.as_deref(),
        }
    }

    /// Short human-readable form: the identifier, else the raw text, else `unknown`.
    pub fn display(&self) -> String {
        self.identifier()
            .or_else(|| self.raw().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckCategory {
    License,
    Ban,
    Source,
}

impl CheckCategory {
    /// Every category, in the order verdicts are emitted per package.
    pub const ALL: [CheckCategory; 3] = [
        CheckCategory::License,
        CheckCategory::Ban,
        CheckCategory::Source,
    ];
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckCategory::License => write!(f, "license"),
            CheckCategory::Ban => write!(f, "ban"),
            CheckCategory::Source => write!(f, "source"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Pass => write!(f, "pass"),
            Outcome::Warn => write!(f, "warn"),
            Outcome::Fail => write!(f, "fail"),
        }
    }
}

/// Outcome of one check against one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub package: String,
    pub version: String,
    pub category: CheckCategory,
    pub outcome: Outcome,
    pub detail: String,
}

/// Verdicts of a whole run, in provider order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub verdicts: Vec<Verdict>,
}

impl Report {
    /// A run fails iff at least one verdict failed.
    pub fn failed(&self) -> bool {
        self.verdicts.iter().any(|v| v.outcome == Outcome::Fail)
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.verdicts.iter().filter(|v| v.outcome == outcome).count()
    }

    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(move |v| v.outcome == outcome)
    }
}
