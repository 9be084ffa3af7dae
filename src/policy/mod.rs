//! The policy a run is evaluated against.
//!
//! A [`Policy`] is built once by [`config`](crate::config) and treated as
//! read-only afterwards; strictness overrides from the command line are
//! applied with [`Policy::with_strict`] before evaluation starts.

pub mod version;

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::models::{CheckCategory, Outcome, PackageRecord};
use crate::provider::normalize_name;
use version::VersionSpec;

#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub licenses: LicensePolicy,
    pub bans: BanPolicy,
    pub sources: SourcePolicy,
}

/// What to do with a package that no explicit rule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Warn,
    Deny,
}

impl Decision {
    /// The verdict outcome for this decision. Under `strict`, a warning fails.
    pub fn outcome(self, strict: bool) -> Outcome {
        match self {
            Decision::Allow => Outcome::Pass,
            Decision::Warn if strict => Outcome::Fail,
            Decision::Warn => Outcome::Warn,
            Decision::Deny => Outcome::Fail,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LicensePolicy {
    /// Canonical identifiers accepted for every package.
    pub allow: BTreeSet<String>,
    /// Canonical identifiers rejected even when also allowed.
    pub deny: BTreeSet<String>,
    /// Outcome for packages that declare no license at all. `None` warns.
    pub unlicensed: Option<Decision>,
    pub exceptions: Vec<LicenseException>,
    pub clarifications: Vec<Clarification>,
    pub private: PrivatePolicy,
    /// Unrecognized licenses fail instead of warn.
    pub strict: bool,
}

/// Extra licenses accepted for one package only. Overrides `deny`.
#[derive(Debug, Clone)]
pub struct LicenseException {
    pub package: String,
    pub allow: BTreeSet<String>,
    pub reason: Option<String>,
}

/// Replaces a package's declared license with a known-good expression.
#[derive(Debug, Clone)]
pub struct Clarification {
    pub package: String,
    pub version: Option<VersionSpec>,
    pub expression: String,
    pub link: Option<String>,
}

impl Clarification {
    pub fn matches(&self, name: &str, version: &str) -> bool {
        self.package == normalize_name(name)
            && self
                .version
                .as_ref()
                .map_or(true, |spec| spec.matches(version) == Some(true))
    }
}

/// Packages published to in-house registries.
#[derive(Debug, Clone, Default)]
pub struct PrivatePolicy {
    /// Skip the license check for packages from `registries`.
    pub ignore: bool,
    pub registries: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BanPolicy {
    pub deny: Vec<BanRule>,
    /// Packages exempt from the ban check; checked before `deny`.
    pub skip: Vec<BanRule>,
    /// A version that cannot be compared against a rule's constraint counts as banned.
    pub strict: bool,
}

#[derive(Debug, Clone)]
pub struct BanRule {
    pub name: String,
    /// `None` bans every version.
    pub version: Option<VersionSpec>,
    pub reason: Option<String>,
}

impl BanRule {
    pub fn matches(&self, name: &str, version: &str, strict: bool) -> bool {
        if self.name != normalize_name(name) {
            return false;
        }
        match &self.version {
            None => true,
            Some(spec) => spec.matches(version).unwrap_or(strict),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourcePolicy {
    /// Exact labels or prefixes. Empty means every source is allowed.
    pub allow: Vec<String>,
    /// Outcome for index/URL sources missing from `allow`.
    pub unknown_registry: Decision,
    /// Outcome for VCS sources missing from `allow`.
    pub unknown_git: Decision,
    /// Only exact matches count; prefixes are not honoured.
    pub strict: bool,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            unknown_registry: Decision::Deny,
            unknown_git: Decision::Deny,
            strict: false,
        }
    }
}

/// VCS source labels look like `git+https://...`.
pub fn is_vcs_source(source: &str) -> bool {
    source.split_once('+').is_some_and(|(vcs, _)| {
        matches!(
            vcs.to_ascii_lowercase().as_str(),
            "git" | "hg" | "svn" | "bzr"
        )
    })
}

/// Case-insensitive prefix match that stops at a path, ref, or fragment
/// boundary, so `https://mirror.example.com` does not accept
/// `https://mirror.example.com.evil.net/`.
fn prefix_matches(source: &str, entry: &str) -> bool {
    let source = source.to_ascii_lowercase();
    let entry = entry.to_ascii_lowercase();
    let Some(rest) = source.strip_prefix(&entry) else {
        return false;
    };
    rest.is_empty()
        || entry.ends_with(['/', '@', '#'])
        || rest.starts_with(['/', '@', '#', '?'])
}

impl Policy {
    pub fn is_license_allowed(&self, canonical: &str) -> bool {
        self.licenses.allow.contains(canonical) && !self.is_license_denied(canonical)
    }

    pub fn is_license_denied(&self, canonical: &str) -> bool {
        self.licenses.deny.contains(canonical)
    }

    /// Like [`Policy::is_license_allowed`], also honouring per-package exceptions.
    pub fn is_license_allowed_for(&self, package: &str, canonical: &str) -> bool {
        self.is_license_allowed(canonical) || self.has_exception(package, canonical)
    }

    /// Denied for this package: globally denied and not excepted.
    pub fn is_license_denied_for(&self, package: &str, canonical: &str) -> bool {
        self.is_license_denied(canonical) && !self.has_exception(package, canonical)
    }

    fn has_exception(&self, package: &str, canonical: &str) -> bool {
        let package = normalize_name(package);
        self.licenses
            .exceptions
            .iter()
            .any(|exc| exc.package == package && exc.allow.contains(canonical))
    }

    /// Whether the license check is skipped for a package from `source`.
    pub fn is_private_source(&self, source: &str) -> bool {
        let private = &self.licenses.private;
        private.ignore
            && private
                .registries
                .iter()
                .any(|registry| prefix_matches(source.trim(), registry))
    }

    /// The first ban rule matching this package, if any.
    pub fn ban_for(&self, name: &str, version: &str) -> Option<&BanRule> {
        self.bans
            .deny
            .iter()
            .find(|rule| rule.matches(name, version, self.bans.strict))
    }

    /// The skip entry exempting this package from the ban check, if any.
    pub fn skip_for(&self, name: &str, version: &str) -> Option<&BanRule> {
        self.bans
            .skip
            .iter()
            .find(|rule| rule.matches(name, version, false))
    }

    pub fn is_source_allowed(&self, source: &str) -> bool {
        self.matching_source(source).is_some() || self.sources.allow.is_empty()
    }

    /// The allow-list entry accepting `source`, if any.
    pub fn matching_source(&self, source: &str) -> Option<&str> {
        let source = source.trim();
        self.sources
            .allow
            .iter()
            .find(|entry| {
                source.eq_ignore_ascii_case(entry)
                    || (!self.sources.strict && prefix_matches(source, entry))
            })
            .map(String::as_str)
    }

    /// Decision for a source that is not in the allow list.
    pub fn unknown_source_decision(&self, source: &str) -> Decision {
        if is_vcs_source(source.trim()) {
            self.sources.unknown_git
        } else {
            self.sources.unknown_registry
        }
    }

    pub fn clarification_for(&self, name: &str, version: &str) -> Option<&Clarification> {
        self.licenses
            .clarifications
            .iter()
            .find(|c| c.matches(name, version))
    }

    /// License declarations to evaluate for `pkg`, after clarification.
    pub fn declared_licenses(&self, pkg: &PackageRecord) -> (Vec<String>, Option<&Clarification>) {
        match self.clarification_for(&pkg.name, &pkg.version) {
            Some(clarify) => (vec![clarify.expression.clone()], Some(clarify)),
            None => (pkg.raw_licenses.clone(), None),
        }
    }

    pub fn strict(&self, category: CheckCategory) -> bool {
        match category {
            CheckCategory::License => self.licenses.strict,
            CheckCategory::Ban => self.bans.strict,
            CheckCategory::Source => self.sources.strict,
        }
    }

    /// Copy of this policy with the strict flag of `category` replaced.
    pub fn with_strict(mut self, category: CheckCategory, strict: bool) -> Self {
        match category {
            CheckCategory::License => self.licenses.strict = strict,
            CheckCategory::Ban => self.bans.strict = strict,
            CheckCategory::Source => self.sources.strict = strict,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banned(policy: &Policy, name: &str, version: &str) -> bool {
        policy.ban_for(name, version).is_some()
    }

    fn ban(name: &str, version: Option<&str>) -> BanRule {
        BanRule {
            name: name.to_string(),
            version: version.map(|v| VersionSpec::parse(v).unwrap()),
            reason: None,
        }
    }

    fn policy_with_bans(rules: Vec<BanRule>) -> Policy {
        Policy {
            bans: BanPolicy {
                deny: rules,
                ..BanPolicy::default()
            },
            ..Policy::default()
        }
    }

    #[test]
    fn test_strict_defaults_to_false() {
        let policy = Policy::default();
        for category in CheckCategory::ALL {
            assert!(!policy.strict(category));
        }
    }

    #[test]
    fn test_ban_without_version_bans_all_versions() {
        let policy = policy_with_bans(vec![ban("evil", None)]);
        assert!(banned(&policy, "evil", "0.1"));
        assert!(banned(&policy, "evil", "99.0"));
        assert!(banned(&policy, "Evil", "not-a-version"));
        assert!(!banned(&policy, "good", "1.0"));
    }

    #[test]
    fn test_ban_with_version_constraint() {
        let policy = policy_with_bans(vec![ban("evil", Some("<2.0"))]);
        assert!(banned(&policy, "evil", "1.5"));
        assert!(!banned(&policy, "evil", "2.5"));
    }

    #[test]
    fn test_ban_with_exact_version() {
        let policy = policy_with_bans(vec![ban("evil", Some("1.0"))]);
        assert!(banned(&policy, "evil", "1.0"));
        assert!(!banned(&policy, "evil", "1.0.1"));
    }

    #[test]
    fn test_ban_names_are_normalized() {
        let policy = policy_with_bans(vec![ban("typing-extensions", None)]);
        assert!(banned(&policy, "Typing_Extensions", "4.0"));
        assert!(banned(&policy, "typing.extensions", "4.0"));
    }

    #[test]
    fn test_uncomparable_version_follows_strict_flag() {
        let lenient = policy_with_bans(vec![ban("evil", Some("<2.0"))]);
        assert!(!banned(&lenient, "evil", "nightly"));

        let strict = lenient.with_strict(CheckCategory::Ban, true);
        assert!(banned(&strict, "evil", "nightly"));
    }

    #[test]
    fn test_empty_source_allowlist_allows_everything() {
        let policy = Policy::default();
        assert!(policy.sources.allow.is_empty());
        assert!(policy.is_source_allowed("pypi"));
        assert!(policy.is_source_allowed("git+https://github.com/x/y@abc"));
        assert!(policy.is_source_allowed("unknown"));
    }

    #[test]
    fn test_source_exact_and_prefix_match() {
        let policy = Policy {
            sources: SourcePolicy {
                allow: vec!["pypi".to_string(), "https://mirror.example.com/".to_string()],
                ..SourcePolicy::default()
            },
            ..Policy::default()
        };
        assert!(policy.is_source_allowed("pypi"));
        assert!(policy.is_source_allowed("PyPI"));
        assert!(policy.is_source_allowed("https://mirror.example.com/simple/foo.whl"));
        assert!(!policy.is_source_allowed("https://evil.example.com/foo.whl"));
        assert!(!policy.is_source_allowed("git+https://github.com/x/y@abc"));

        let strict = policy.with_strict(CheckCategory::Source, true);
        assert!(strict.is_source_allowed("pypi"));
        assert!(!strict.is_source_allowed("https://mirror.example.com/simple/foo.whl"));
    }

    #[test]
    fn test_license_exceptions_are_per_package() {
        let mut policy = Policy::default();
        policy.licenses.allow.insert("MIT".to_string());
        policy.licenses.exceptions.push(LicenseException {
            package: "certifi".to_string(),
            allow: BTreeSet::from(["MPL-2.0".to_string()]),
            reason: None,
        });

        assert!(policy.is_license_allowed("MIT"));
        assert!(!policy.is_license_allowed("MPL-2.0"));
        assert!(policy.is_license_allowed_for("certifi", "MPL-2.0"));
        assert!(policy.is_license_allowed_for("Certifi", "MIT"));
        assert!(!policy.is_license_allowed_for("requests", "MPL-2.0"));
    }

    #[test]
    fn test_clarification_respects_version() {
        let mut policy = Policy::default();
        policy.licenses.clarifications.push(Clarification {
            package: "foo".to_string(),
            version: Some(VersionSpec::parse("<2.0").unwrap()),
            expression: "MIT".to_string(),
            link: None,
        });

        let old = PackageRecord::new("foo", "1.0", vec![], "pypi");
        let new = PackageRecord::new("foo", "2.0", vec!["GPL-3.0".to_string()], "pypi");

        let (licenses, clarified) = policy.declared_licenses(&old);
        assert_eq!(licenses, vec!["MIT".to_string()]);
        assert!(clarified.is_some());

        let (licenses, clarified) = policy.declared_licenses(&new);
        assert_eq!(licenses, vec!["GPL-3.0".to_string()]);
        assert!(clarified.is_none());
    }

    #[test]
    fn test_source_prefix_stops_at_boundary() {
        let policy = Policy {
            sources: SourcePolicy {
                allow: vec![
                    "https://mirror.example.com".to_string(),
                    "git+https://github.com/org/tool".to_string(),
                ],
                ..SourcePolicy::default()
            },
            ..Policy::default()
        };
        assert!(policy.is_source_allowed("https://mirror.example.com/simple/foo.whl"));
        assert!(!policy.is_source_allowed("https://mirror.example.com.evil.net/foo.whl"));
        assert!(policy.is_source_allowed("git+https://github.com/org/tool@deadbeef"));
        assert!(!policy.is_source_allowed("git+https://github.com/org/toolkit@deadbeef"));
    }

    #[test]
    fn test_unknown_source_decision_by_kind() {
        let policy = Policy {
            sources: SourcePolicy {
                allow: vec!["pypi".to_string()],
                unknown_git: Decision::Warn,
                ..SourcePolicy::default()
            },
            ..Policy::default()
        };
        assert_eq!(
            policy.unknown_source_decision("git+https://github.com/x/y@abc"),
            Decision::Warn
        );
        assert_eq!(
            policy.unknown_source_decision("https://evil.example.com/foo.whl"),
            Decision::Deny
        );
        assert!(is_vcs_source("hg+https://hg.example.com/repo"));
        assert!(!is_vcs_source("file:///home/me/pkg"));
    }

    #[test]
    fn test_denied_license_overrides_allow_but_not_exception() {
        let mut policy = Policy::default();
        policy.licenses.allow.insert("GPL-3.0".to_string());
        policy.licenses.deny.insert("GPL-3.0".to_string());
        policy.licenses.exceptions.push(LicenseException {
            package: "vetted".to_string(),
            allow: BTreeSet::from(["GPL-3.0".to_string()]),
            reason: None,
        });

        assert!(!policy.is_license_allowed("GPL-3.0"));
        assert!(policy.is_license_denied_for("other", "GPL-3.0"));
        assert!(!policy.is_license_allowed_for("other", "GPL-3.0"));
        assert!(policy.is_license_allowed_for("vetted", "GPL-3.0"));
        assert!(!policy.is_license_denied_for("vetted", "GPL-3.0"));
    }

    #[test]
    fn test_skip_list_and_private_registries() {
        let mut policy = policy_with_bans(vec![ban("evil", None)]);
        policy.bans.skip.push(ban("evil", Some(">=3.0")));
        assert!(policy.skip_for("evil", "3.1").is_some());
        assert!(policy.skip_for("evil", "2.0").is_none());

        policy.licenses.private.registries = vec!["https://pypi.corp.example/".to_string()];
        assert!(!policy.is_private_source("https://pypi.corp.example/simple/x.whl"));
        policy.licenses.private.ignore = true;
        assert!(policy.is_private_source("https://pypi.corp.example/simple/x.whl"));
        assert!(!policy.is_private_source("pypi"));
    }

    #[test]
    fn test_decision_outcomes() {
        assert_eq!(Decision::Allow.outcome(true), Outcome::Pass);
        assert_eq!(Decision::Warn.outcome(false), Outcome::Warn);
        assert_eq!(Decision::Warn.outcome(true), Outcome::Fail);
        assert_eq!(Decision::Deny.outcome(false), Outcome::Fail);
    }
}
