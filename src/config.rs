use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::license::normalize::normalize_one;
use crate::policy::version::VersionSpec;
use crate::policy::{
    is_vcs_source, BanPolicy, BanRule, Clarification, Decision, LicenseException, LicensePolicy,
    Policy, PrivatePolicy, SourcePolicy,
};
use crate::provider::normalize_name;

pub const CONFIG_FILENAME: &str = "licenses-deny.toml";

/// Written by `licenses-deny init`.
pub const TEMPLATE_CONFIG: &str = r#"# licenses-deny policy

[licenses]
# Canonical identifiers (or any spelling the normalizer understands).
allow = [
    "MIT",
    "Apache-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "ISC",
    "PSF-2.0",
]
# Always fail these, even when an allowed alternative exists elsewhere.
# deny = ["AGPL-3.0"]
# Packages that declare no license at all: "allow", "warn" or "deny".
# unlicensed = "warn"
# Fail, rather than warn, on packages whose license cannot be recognized.
strict = false

# Skip the license check for packages installed from private indexes.
# [licenses.private]
# ignore = true
# registries = ["https://pypi.internal.example.com/simple"]

# Accept an extra license for a single package.
# [[licenses.exceptions]]
# package = "certifi"
# allow = ["MPL-2.0"]
# reason = "Data-only package"

# Override the declared license when upstream metadata is wrong or missing.
# [[licenses.clarify]]
# package = "example"
# version = "<2.0"
# expression = "MIT"
# link = "https://github.com/example/example/blob/main/LICENSE"

[bans]
# Treat versions that cannot be compared against a constraint as banned.
strict = false

# [[bans.deny]]
# name = "insecure-package"
# version = "<2.0"
# reason = "CVE-2024-0000"

# Exempt a package from every ban rule.
# [[bans.skip]]
# name = "legacy-tool"
# reason = "Vendored, reviewed manually"

[sources]
# Exact labels or prefixes. An empty list allows every source.
allow = ["pypi"]
# allow-registry = ["https://pypi.internal.example.com/simple"]
# allow-git = ["https://github.com/example/tool"]
# allow-org = { github = ["example"] }
# Unlisted sources: "allow", "warn" or "deny".
# unknown-registry = "deny"
# unknown-git = "deny"
# Require exact matches; disable prefix matching.
strict = false
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file 'licenses-deny.toml' not found near {root}. Run `licenses-deny init` to create a template.")]
    NotFound { root: PathBuf },

    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path}: [[bans.{section}]] entry #{index} has an empty name")]
    InvalidBan {
        path: PathBuf,
        section: &'static str,
        index: usize,
    },

    #[error("{path}: invalid version constraint for `{package}`: {source}")]
    InvalidVersionSpec {
        path: PathBuf,
        package: String,
        #[source]
        source: crate::policy::version::VersionSpecError,
    },

    #[error("{path}: clarification for `{package}` has unrecognized expression `{expression}`")]
    InvalidClarify {
        path: PathBuf,
        package: String,
        expression: String,
    },

    #[error("{path}: [[licenses.exceptions]] entry #{index} needs a package and a non-empty allow list")]
    InvalidException { path: PathBuf, index: usize },

    #[error("Config already exists at {path}. Use --force to overwrite.")]
    AlreadyExists { path: PathBuf },

    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// On-disk schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    licenses: LicensesSection,
    #[serde(default)]
    bans: BansSection,
    #[serde(default)]
    sources: SourcesSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LicensesSection {
    allow: Vec<String>,
    #[serde(default)]
    deny: Vec<String>,
    #[serde(default)]
    unlicensed: Option<Decision>,
    #[serde(default)]
    private: PrivateSection,
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    exceptions: Vec<ExceptionEntry>,
    #[serde(default)]
    clarify: Vec<ClarifyEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PrivateSection {
    #[serde(default)]
    ignore: bool,
    #[serde(default)]
    registries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExceptionEntry {
    package: String,
    allow: Vec<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClarifyEntry {
    package: String,
    #[serde(default)]
    version: Option<String>,
    expression: String,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BansSection {
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    deny: Vec<BanEntry>,
    #[serde(default)]
    skip: Vec<BanEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BanEntry {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct SourcesSection {
    #[serde(default)]
    allow: Vec<String>,
    #[serde(default)]
    allow_registry: Vec<String>,
    #[serde(default)]
    allow_git: Vec<String>,
    /// Host (`github`, `gitlab`, `bitbucket`, or a domain) to organisations.
    #[serde(default)]
    allow_org: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    unknown_registry: Option<Decision>,
    #[serde(default)]
    unknown_git: Option<Decision>,
    #[serde(default)]
    strict: bool,
}

// ---------------------------------------------------------------------------
// Discovery and loading
// ---------------------------------------------------------------------------

/// Locate the policy file, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<project_root>/licenses-deny.toml`
/// 3. `~/.config/licenses-deny/licenses-deny.toml`
pub fn locate_config(
    project_root: &Path,
    config_override: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = config_override {
        return Ok(path.to_path_buf());
    }

    let project_config = project_root.join(CONFIG_FILENAME);
    if project_config.is_file() {
        return Ok(project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("licenses-deny")
            .join(CONFIG_FILENAME);
        if home_config.is_file() {
            return Ok(home_config);
        }
    }

    Err(ConfigError::NotFound {
        root: project_root.to_path_buf(),
    })
}

/// Read and validate the policy file at `path`.
pub fn load_policy(path: &Path) -> Result<Policy, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let policy = parse_policy(&content, path)?;
    info!(path = %path.display(), "loaded policy");
    Ok(policy)
}

/// Parse and validate policy TOML. `path` is only used in error messages.
pub fn parse_policy(content: &str, path: &Path) -> Result<Policy, ConfigError> {
    let file: ConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Policy {
        licenses: build_license_policy(file.licenses, path)?,
        bans: build_ban_policy(file.bans, path)?,
        sources: build_source_policy(file.sources),
    })
}

/// `allow-git` entries are matched against `git+<url>` source labels.
fn git_label(url: &str) -> String {
    if is_vcs_source(url) {
        url.to_string()
    } else {
        format!("git+{url}")
    }
}

fn org_host(host: &str) -> &str {
    match host {
        "github" => "github.com",
        "gitlab" => "gitlab.com",
        "bitbucket" => "bitbucket.org",
        other => other,
    }
}

fn build_source_policy(section: SourcesSection) -> SourcePolicy {
    let mut allow: Vec<String> = section
        .allow
        .into_iter()
        .chain(section.allow_registry)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    allow.extend(
        section
            .allow_git
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(git_label),
    );

    for (host, orgs) in &section.allow_org {
        let host = org_host(host.trim());
        for org in orgs.iter().map(|o| o.trim()).filter(|o| !o.is_empty()) {
            allow.push(format!("git+https://{host}/{org}/"));
        }
    }

    let defaults = SourcePolicy::default();
    SourcePolicy {
        allow,
        unknown_registry: section.unknown_registry.unwrap_or(defaults.unknown_registry),
        unknown_git: section.unknown_git.unwrap_or(defaults.unknown_git),
        strict: section.strict,
    }
}

/// Map allow-list entries to canonical identifiers so `"MIT License"` and
/// `"MIT"` mean the same thing. Unrecognized entries are kept verbatim.
fn canonical_allow_set(entries: &[String]) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
        match normalize_one(entry) {
            Some(expr) if expr.licenses().len() == 1 => {
                set.insert(expr.to_string());
            }
            _ => {
                warn!(entry = %entry, "license list entry is not a recognized license identifier");
                set.insert(entry.to_string());
            }
        }
    }
    set
}

fn optional_spec(
    spec: Option<String>,
    package: &str,
    path: &Path,
) -> Result<Option<VersionSpec>, ConfigError> {
    spec.filter(|s| !s.trim().is_empty())
        .map(|s| VersionSpec::parse(&s))
        .transpose()
        .map_err(|source| ConfigError::InvalidVersionSpec {
            path: path.to_path_buf(),
            package: package.to_string(),
            source,
        })
}

fn build_license_policy(
    section: LicensesSection,
    path: &Path,
) -> Result<LicensePolicy, ConfigError> {
    let allow = canonical_allow_set(&section.allow);
    if allow.is_empty() {
        warn!("[licenses.allow] is empty. All recognized licenses will be rejected.");
    }

    let mut exceptions = Vec::new();
    for (index, entry) in section.exceptions.into_iter().enumerate() {
        if entry.package.trim().is_empty() || entry.allow.is_empty() {
            return Err(ConfigError::InvalidException {
                path: path.to_path_buf(),
                index: index + 1,
            });
        }
        exceptions.push(LicenseException {
            package: normalize_name(&entry.package),
            allow: canonical_allow_set(&entry.allow),
            reason: entry.reason,
        });
    }

    let mut clarifications = Vec::new();
    for entry in section.clarify {
        let package = normalize_name(&entry.package);
        if normalize_one(&entry.expression).is_none() {
            return Err(ConfigError::InvalidClarify {
                path: path.to_path_buf(),
                package,
                expression: entry.expression,
            });
        }
        clarifications.push(Clarification {
            version: optional_spec(entry.version, &package, path)?,
            package,
            expression: entry.expression,
            link: entry.link,
        });
    }

    let deny = canonical_allow_set(&section.deny);
    if let Some(both) = allow.intersection(&deny).next() {
        warn!(license = %both, "license is both allowed and denied; deny wins");
    }

    Ok(LicensePolicy {
        allow,
        deny,
        unlicensed: section.unlicensed,
        exceptions,
        clarifications,
        private: PrivatePolicy {
            ignore: section.private.ignore,
            registries: section
                .private
                .registries
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        },
        strict: section.strict,
    })
}

fn ban_rules(
    entries: Vec<BanEntry>,
    section: &'static str,
    path: &Path,
) -> Result<Vec<BanRule>, ConfigError> {
    let mut rules = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let name = normalize_name(&entry.name);
        if name.is_empty() {
            return Err(ConfigError::InvalidBan {
                path: path.to_path_buf(),
                section,
                index: index + 1,
            });
        }
        rules.push(BanRule {
            version: optional_spec(entry.version, &name, path)?,
            name,
            reason: entry.reason.filter(|r| !r.trim().is_empty()),
        });
    }
    Ok(rules)
}

fn build_ban_policy(section: BansSection, path: &Path) -> Result<BanPolicy, ConfigError> {
    Ok(BanPolicy {
        deny: ban_rules(section.deny, "deny", path)?,
        skip: ban_rules(section.skip, "skip", path)?,
        strict: section.strict,
    })
}

/// Write [`TEMPLATE_CONFIG`] into `project_root`. Refuses to overwrite an
/// existing file unless `force` is set.
pub fn write_template(project_root: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let target = project_root.join(CONFIG_FILENAME);
    if target.exists() {
        if !force {
            return Err(ConfigError::AlreadyExists { path: target });
        }
        warn!(path = %target.display(), "overwriting existing config");
    }

    std::fs::create_dir_all(project_root)
        .and_then(|_| std::fs::write(&target, TEMPLATE_CONFIG))
        .map_err(|source| ConfigError::Write {
            path: target.clone(),
            source,
        })?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckCategory;
    use tempfile::TempDir;

    fn banned(policy: &Policy, name: &str, version: &str) -> bool {
        policy.ban_for(name, version).is_some()
    }

    fn parse(content: &str) -> Result<Policy, ConfigError> {
        parse_policy(content, Path::new("licenses-deny.toml"))
    }

    #[test]
    fn test_template_parses() {
        let policy = parse(TEMPLATE_CONFIG).unwrap();
        assert!(policy.is_license_allowed("MIT"));
        assert!(policy.is_license_allowed("PSF-2.0"));
        assert!(policy.bans.deny.is_empty());
        assert_eq!(policy.sources.allow, vec!["pypi".to_string()]);
        for category in CheckCategory::ALL {
            assert!(!policy.strict(category));
        }
    }

    #[test]
    fn test_full_config() {
        let policy = parse(
            r#"
[licenses]
allow = ["MIT License", "apache-2.0"]
strict = true

[[licenses.exceptions]]
package = "Certifi"
allow = ["MPL-2.0"]
reason = "data only"

[[licenses.clarify]]
package = "foo"
version = "<2.0"
expression = "BSD-3-Clause"

[bans]
[[bans.deny]]
name = "evil"
version = "<2.0"
reason = "backdoor"

[[bans.deny]]
name = "Also_Evil"

[sources]
allow = ["pypi", " https://mirror.example.com/ "]
strict = true
"#,
        )
        .unwrap();

        assert!(policy.is_license_allowed("MIT"));
        assert!(policy.is_license_allowed("Apache-2.0"));
        assert!(policy.licenses.strict);
        assert!(policy.is_license_allowed_for("certifi", "MPL-2.0"));
        assert!(policy.clarification_for("foo", "1.0").is_some());
        assert!(policy.clarification_for("foo", "2.0").is_none());

        assert!(banned(&policy, "evil", "1.5"));
        assert!(!banned(&policy, "evil", "2.5"));
        assert!(banned(&policy, "also-evil", "0.0.1"));
        assert_eq!(policy.bans.deny[0].reason.as_deref(), Some("backdoor"));

        assert_eq!(
            policy.sources.allow,
            vec!["pypi".to_string(), "https://mirror.example.com/".to_string()]
        );
        assert!(policy.sources.strict);
    }

    #[test]
    fn test_deny_skip_and_private_sections() {
        let policy = parse(
            r#"
[licenses]
allow = ["MIT", "GPL-3.0"]
deny = ["GPLv3", "AGPL-3.0"]
unlicensed = "deny"

[licenses.private]
ignore = true
registries = ["https://pypi.internal.example.com/simple"]

[[bans.deny]]
name = "requests"

[[bans.skip]]
name = "Requests"
version = ">=2.31"
reason = "patched fork"
"#,
        )
        .unwrap();

        assert!(policy.is_license_denied("GPL-3.0"));
        assert!(!policy.is_license_allowed("GPL-3.0"));
        assert!(policy.is_license_denied("AGPL-3.0"));
        assert_eq!(policy.licenses.unlicensed, Some(Decision::Deny));
        assert!(policy.is_private_source("https://pypi.internal.example.com/simple/foo"));
        assert!(!policy.is_private_source("pypi"));

        assert!(banned(&policy, "requests", "2.31.0"));
        let skip = policy.skip_for("requests", "2.31.0").unwrap();
        assert_eq!(skip.reason.as_deref(), Some("patched fork"));
        assert!(policy.skip_for("requests", "2.0").is_none());
    }

    #[test]
    fn test_empty_skip_name_is_fatal() {
        let err = parse("[licenses]\nallow = []\n[[bans.skip]]\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBan { section: "skip", index: 1, .. }));
    }

    #[test]
    fn test_registry_git_and_org_sources() {
        let policy = parse(
            r#"
[licenses]
allow = ["MIT"]

[sources]
allow = ["pypi"]
allow-registry = ["https://pypi.internal.example.com/simple"]
allow-git = ["https://github.com/acme/tool", "hg+https://hg.example.com/repo"]
allow-org = { github = ["example"], "git.example.org" = ["team"] }
unknown-git = "warn"
"#,
        )
        .unwrap();

        assert_eq!(
            policy.sources.allow,
            vec![
                "pypi".to_string(),
                "https://pypi.internal.example.com/simple".to_string(),
                "git+https://github.com/acme/tool".to_string(),
                "hg+https://hg.example.com/repo".to_string(),
                "git+https://git.example.org/team/".to_string(),
                "git+https://github.com/example/".to_string(),
            ]
        );
        assert!(policy.is_source_allowed("git+https://github.com/acme/tool@v1.2"));
        assert!(policy.is_source_allowed("git+https://github.com/example/widgets@main"));
        assert!(!policy.is_source_allowed("git+https://github.com/examples/widgets@main"));
        assert_eq!(policy.sources.unknown_git, Decision::Warn);
        assert_eq!(policy.sources.unknown_registry, Decision::Deny);
    }

    #[test]
    fn test_unknown_decision_must_be_known() {
        let err = parse("[licenses]\nallow = []\n[sources]\nunknown-git = \"maybe\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_licenses_section_is_fatal() {
        let err = parse("[bans]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_keys_are_fatal() {
        let err = parse("[licenses]\nallow = []\nalow = [\"MIT\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_version_constraint_is_fatal() {
        let err = parse(
            "[licenses]\nallow = []\n[[bans.deny]]\nname = \"evil\"\nversion = \"<banana\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVersionSpec { ref package, .. } if package == "evil"));
    }

    #[test]
    fn test_empty_ban_name_is_fatal() {
        let err = parse("[licenses]\nallow = []\n[[bans.deny]]\nname = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBan { index: 1, .. }));
    }

    #[test]
    fn test_unrecognized_clarification_is_fatal() {
        let err = parse(
            "[licenses]\nallow = []\n[[licenses.clarify]]\npackage = \"foo\"\nexpression = \"Mystery\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidClarify { .. }));
    }

    #[test]
    fn test_exception_needs_allow_list() {
        let err = parse(
            "[licenses]\nallow = []\n[[licenses.exceptions]]\npackage = \"foo\"\nallow = []\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidException { index: 1, .. }));
    }

    #[test]
    fn test_absent_sources_allow_everything() {
        let policy = parse("[licenses]\nallow = [\"MIT\"]\n").unwrap();
        assert!(policy.sources.allow.is_empty());
        assert!(policy.is_source_allowed("git+https://example.com/x@1"));
    }

    #[test]
    fn test_locate_config_prefers_override_then_project() {
        let tmp = TempDir::new().unwrap();
        let override_path = tmp.path().join("custom.toml");
        assert_eq!(
            locate_config(tmp.path(), Some(&override_path)).unwrap(),
            override_path
        );

        std::fs::write(tmp.path().join(CONFIG_FILENAME), TEMPLATE_CONFIG).unwrap();
        assert_eq!(
            locate_config(tmp.path(), None).unwrap(),
            tmp.path().join(CONFIG_FILENAME)
        );
    }

    #[test]
    fn test_load_policy_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_policy(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_write_template_respects_force() {
        let tmp = TempDir::new().unwrap();
        let path = write_template(tmp.path(), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), TEMPLATE_CONFIG);

        let err = write_template(tmp.path(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists { .. }));

        std::fs::write(&path, "garbage").unwrap();
        write_template(tmp.path(), true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), TEMPLATE_CONFIG);
    }
}
