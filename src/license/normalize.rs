use tracing::debug;

use crate::license::expression::{self, LicenseExpr};
use crate::license::table;
use crate::models::CanonicalLicense;

/// Boilerplate stripped from the front of a declaration before lookup.
const NOISE_PREFIXES: &[&str] = &["spdx-license-identifier:", "license:", "licence:"];

/// "Or later" phrasing; the base version is what policy matches on.
const LATER_SUFFIXES: &[&str] = &[" or any later version", " or later", " or newer", "+"];

/// Trim, collapse whitespace, case-fold, and strip known boilerplate.
///
/// Trove classifiers (`License :: OSI Approved :: MIT License`) reduce to
/// their last segment.
pub fn preprocess(raw: &str) -> String {
    let mut key = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    if key.starts_with("license ::") {
        if let Some(last) = key.rsplit("::").next() {
            key = last.trim().to_string();
        }
    }

    for prefix in NOISE_PREFIXES {
        if let Some(rest) = key.strip_prefix(prefix) {
            key = rest.trim().to_string();
        }
    }

    let mut key = key
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace())
        .to_string();
    while let Some(rest) = LATER_SUFFIXES.iter().find_map(|suffix| key.strip_suffix(suffix)) {
        key = rest.trim_end().to_string();
    }
    key
}

/// Resolve a single (non-compound) declaration to a canonical identifier.
fn resolve_term(raw: &str) -> Option<String> {
    let key = preprocess(raw);
    if key.is_empty() {
        return None;
    }
    lookup_variants(&key)
        .or_else(|| table::fallback(&key))
        .map(str::to_string)
}

/// Exact table lookup, then with a leading `the ` or trailing ` license` dropped.
fn lookup_variants(key: &str) -> Option<&'static str> {
    table::lookup(key)
        .or_else(|| key.strip_prefix("the ").and_then(table::lookup))
        .or_else(|| {
            key.strip_suffix(" license")
                .or_else(|| key.strip_suffix(" licence"))
                .and_then(table::lookup)
        })
}

/// Normalize one raw declaration.
///
/// Order: exact table lookup of the whole string, compound expression parse
/// when operators are present, then the keyword fallback rules. A failed
/// parse of a conjunction (`AND` / `WITH`) is final: matching one keyword
/// would hide the parts that did not resolve.
pub fn normalize_one(raw: &str) -> Option<LicenseExpr> {
    let key = preprocess(raw);
    if key.is_empty() {
        return None;
    }
    if let Some(id) = lookup_variants(&key) {
        return Some(LicenseExpr::license(id));
    }
    if expression::has_operators(&key) {
        if let Some(expr) = expression::parse(&key, &resolve_term) {
            return Some(expr);
        }
        if expression::has_conjunction(&key) {
            debug!(raw = %raw, "compound license with unresolved terms");
            return None;
        }
    }
    table::fallback(&key).map(LicenseExpr::license)
}

/// Normalize a package's declared license fields into one [`CanonicalLicense`].
///
/// The first declaration that resolves wins. When none resolves, the raw
/// declarations are kept for display; when none was declared at all the
/// result carries no raw text.
pub fn normalize(raw_licenses: &[String]) -> CanonicalLicense {
    let declared: Vec<&str> = raw_licenses
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if declared.is_empty() {
        return CanonicalLicense::Unrecognized { raw: None };
    }

    for raw in &declared {
        if let Some(expr) = normalize_one(raw) {
            debug!(raw = %raw, canonical = %expr, "normalized license");
            return CanonicalLicense::Recognized {
                expr,
                raw: raw.to_string(),
            };
        }
    }

    debug!(raw = ?declared, "unrecognized license");
    CanonicalLicense::Unrecognized {
        raw: Some(declared.join("; ")),
    }
}

/// Every distinct declaration that resolves, in declaration order.
pub fn recognized_declarations(raw_licenses: &[String]) -> Vec<LicenseExpr> {
    let mut found: Vec<LicenseExpr> = Vec::new();
    for expr in raw_licenses.iter().filter_map(|raw| normalize_one(raw)) {
        if !found.contains(&expr) {
            found.push(expr);
        }
    }
    found
}

/// Collapse whitespace and cap length for display.
pub fn summarize(value: &str, max_len: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_len {
        let cut: String = collapsed.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        collapsed
    }
}
