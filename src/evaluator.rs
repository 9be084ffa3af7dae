//! Runs the license, ban, and source checks of a [`Policy`] over package records.
//!
//! Checks are independent: every enabled category yields exactly one
//! [`Verdict`] per package, whatever the other categories decided. Package
//! order is preserved; one package's verdicts never depend on another's.

use tracing::debug;

use crate::license::normalize::{normalize, recognized_declarations, summarize};
use crate::models::{CheckCategory, Outcome, PackageRecord, Report, Verdict};
use crate::policy::{Decision, Policy};

/// Longest raw license text echoed in a verdict detail.
const MAX_DETAIL_LICENSE_LEN: usize = 64;

pub struct Evaluator<'a> {
    policy: &'a Policy,
}

impl<'a> Evaluator<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self { policy }
    }

    /// Evaluate `categories` (deduplicated, in the given order) for every package.
    pub fn evaluate(&self, packages: &[PackageRecord], categories: &[CheckCategory]) -> Report {
        let mut enabled: Vec<CheckCategory> = Vec::with_capacity(categories.len());
        for category in categories {
            if !enabled.contains(category) {
                enabled.push(*category);
            }
        }

        let verdicts = packages
            .iter()
            .flat_map(|pkg| enabled.iter().map(move |category| self.check(pkg, *category)))
            .collect();

        Report { verdicts }
    }

    pub fn check(&self, pkg: &PackageRecord, category: CheckCategory) -> Verdict {
        let (outcome, detail) = match category {
            CheckCategory::License => self.check_license(pkg),
            CheckCategory::Ban => self.check_ban(pkg),
            CheckCategory::Source => self.check_source(pkg),
        };
        debug!(package = %pkg.name, %category, %outcome, %detail, "checked");
        Verdict {
            package: pkg.name.clone(),
            version: pkg.version.clone(),
            category,
            outcome,
            detail,
        }
    }

    fn check_license(&self, pkg: &PackageRecord) -> (Outcome, String) {
        if self.policy.is_private_source(&pkg.source) {
            return (
                Outcome::Pass,
                "private package, license check skipped".to_string(),
            );
        }

        let (declared, clarification) = self.policy.declared_licenses(pkg);
        let canonical = normalize(&declared);
        let suffix = if clarification.is_some() { " (clarified)" } else { "" };
        let strict = self.policy.strict(CheckCategory::License);

        let Some(primary) = canonical.identifier() else {
            return match canonical.raw() {
                None => {
                    let decision = self.policy.licenses.unlicensed.unwrap_or(Decision::Warn);
                    (decision.outcome(strict), "no license declared".to_string())
                }
                Some(raw) => (
                    Decision::Warn.outcome(strict),
                    format!(
                        "unrecognized license: {}",
                        summarize(raw, MAX_DETAIL_LICENSE_LEN)
                    ),
                ),
            };
        };

        // Several recognized declarations: any allowed one is enough.
        let allowed = |id: &str| self.policy.is_license_allowed_for(&pkg.name, id);
        if let Some(accepted) = recognized_declarations(&declared)
            .into_iter()
            .find(|expr| expr.is_satisfied_by(&allowed))
        {
            return (Outcome::Pass, format!("{accepted}{suffix}"));
        }

        let denied = canonical.expr().and_then(|expr| {
            expr.licenses()
                .into_iter()
                .find(|id| self.policy.is_license_denied_for(&pkg.name, id))
        });
        if let Some(id) = denied {
            return (Outcome::Fail, format!("license denied: {id}{suffix}"));
        }

        let raw = canonical.raw().unwrap_or_default();
        let detail = if raw != primary {
            format!(
                "license not allowed: {primary}{suffix} (raw: {})",
                summarize(raw, MAX_DETAIL_LICENSE_LEN)
            )
        } else {
            format!("license not allowed: {primary}{suffix}")
        };
        (Outcome::Fail, detail)
    }

    fn check_ban(&self, pkg: &PackageRecord) -> (Outcome, String) {
        if let Some(skip) = self.policy.skip_for(&pkg.name, &pkg.version) {
            let detail = match &skip.reason {
                Some(reason) => format!("ban check skipped: {reason}"),
                None => "ban check skipped".to_string(),
            };
            return (Outcome::Pass, detail);
        }

        let Some(rule) = self.policy.ban_for(&pkg.name, &pkg.version) else {
            return (Outcome::Pass, "not banned".to_string());
        };

        let mut detail = match &rule.version {
            Some(spec) => format!("banned ({} {spec})", rule.name),
            None => format!("banned ({})", rule.name),
        };
        if let Some(reason) = &rule.reason {
            detail.push_str(": ");
            detail.push_str(reason);
        }
        (Outcome::Fail, detail)
    }

    fn check_source(&self, pkg: &PackageRecord) -> (Outcome, String) {
        if !self.policy.is_source_allowed(&pkg.source) {
            let decision = self.policy.unknown_source_decision(&pkg.source);
            let outcome = decision.outcome(self.policy.strict(CheckCategory::Source));
            let detail = match outcome {
                Outcome::Pass => format!("{} (unlisted source allowed)", pkg.source),
                _ => format!("source not in allowlist: {}", pkg.source),
            };
            return (outcome, detail);
        }
        let detail = match self.policy.matching_source(&pkg.source) {
            Some(entry) if entry.eq_ignore_ascii_case(pkg.source.trim()) => pkg.source.clone(),
            Some(entry) => format!("{} (matches {entry})", pkg.source),
            None => format!("{} (all sources allowed)", pkg.source),
        };
        (Outcome::Pass, detail)
    }
}

/// Run every check category with the policy's own strict flags.
pub fn evaluate_all(packages: &[PackageRecord], policy: &Policy) -> Report {
    Evaluator::new(policy).evaluate(packages, &CheckCategory::ALL)
}

/// Run a single category, optionally overriding its strict flag.
pub fn evaluate_category(
    packages: &[PackageRecord],
    policy: &Policy,
    category: CheckCategory,
    strict: Option<bool>,
) -> Report {
    let policy = match strict {
        Some(strict) => policy.clone().with_strict(category, strict),
        None => policy.clone(),
    };
    Evaluator::new(&policy).evaluate(packages, &[category])
}
