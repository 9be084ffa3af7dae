//! Package versions and the comparator constraints used by bans and clarifications.
//!
//! Versions follow the common subset of PEP 440: a dotted numeric release,
//! optional pre-release (`a`, `b`, `rc`), post-release, and dev segments,
//! and an ignored local suffix (`+...`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    /// `1.0.dev1` with no pre or post segment sorts before any pre-release.
    DevOnly,
    Pre(u8, u64),
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    None,
}

#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Option<(u8, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

fn version_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?ix)^
            v?
            (?P<release>\d+(?:\.\d+)*)
            (?:[-_.]?(?P<pre_l>a|alpha|b|beta|rc|c|pre|preview)[-_.]?(?P<pre_n>\d*))?
            (?:(?:[-_.]?(?:post|rev|r)[-_.]?(?P<post_n>\d*))|(?:-(?P<post_implicit>\d+)))?
            (?:[-_.]?dev[-_.]?(?P<dev_n>\d*))?
            (?:\+[a-z0-9]+(?:[-_.][a-z0-9]+)*)?
            $",
        )
        .ok()
    })
    .as_ref()
}

fn number(s: Option<regex::Match<'_>>) -> u64 {
    s.and_then(|m| m.as_str().parse().ok()).unwrap_or(0)
}

impl Version {
    /// Parse a version string, or `None` when it is not version-shaped.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = version_regex()?.captures(input.trim())?;

        let release = caps["release"]
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let pre = caps.name("pre_l").map(|label| {
            let rank = match label.as_str().to_ascii_lowercase().as_str() {
                "a" | "alpha" => 0,
                "b" | "beta" => 1,
                _ => 2,
            };
            (rank, number(caps.name("pre_n")))
        });

        let post = match (caps.name("post_n"), caps.name("post_implicit")) {
            (Some(n), _) => Some(n.as_str().parse().unwrap_or(0)),
            (None, Some(n)) => n.as_str().parse().ok(),
            (None, None) => None,
        };

        let dev = caps
            .name("dev_n")
            .map(|n| n.as_str().parse().unwrap_or(0));

        Some(Self {
            release,
            pre,
            post,
            dev,
        })
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (Some((rank, n)), _, _) => PreKey::Pre(rank, n),
            _ => PreKey::Final,
        }
    }

    fn dev_key(&self) -> DevKey {
        self.dev.map(DevKey::Dev).unwrap_or(DevKey::None)
    }

    fn release_at(&self, i: usize) -> u64 {
        self.release.get(i).copied().unwrap_or(0)
    }

    fn cmp_release(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        (0..len)
            .map(|i| self.release_at(i).cmp(&other.release_at(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Whether the first `prefix.len()` release segments equal `prefix`.
    fn has_release_prefix(&self, prefix: &[u64]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(i, segment)| self.release_at(i) == *segment)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_release(other)
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Compatible,
    Arbitrary,
}

#[derive(Debug, Clone)]
struct Clause {
    op: Op,
    /// Text after the operator, e.g. `1.4.*`.
    operand: String,
    version: Option<Version>,
    /// `==1.4.*` / `!=1.4.*`: compare on the release prefix only.
    wildcard: Option<Vec<u64>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid version constraint `{spec}`: {reason}")]
pub struct VersionSpecError {
    pub spec: String,
    pub reason: String,
}

/// A conjunction of comparator clauses such as `>=1.0,<2.0`.
///
/// A bare version (`1.5`) or a single `=` means an exact match.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    raw: String,
    clauses: Vec<Clause>,
}

impl VersionSpec {
    pub fn parse(spec: &str) -> Result<Self, VersionSpecError> {
        let raw = spec.trim().to_string();
        let err = |reason: &str| VersionSpecError {
            spec: raw.clone(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(err("empty constraint"));
        }

        let mut clauses = Vec::new();
        for part in raw.split(',').map(str::trim) {
            if part.is_empty() {
                return Err(err("empty clause"));
            }
            clauses.push(parse_clause(part).map_err(|reason| err(&reason))?);
        }

        Ok(Self { raw, clauses })
    }

    /// Whether `version` satisfies every clause.
    ///
    /// Returns `None` when the answer depends on ordering a version that
    /// does not parse; exact clauses still fall back to string equality.
    pub fn matches(&self, version: &str) -> Option<bool> {
        let parsed = Version::parse(version);
        let mut undecided = false;
        for clause in &self.clauses {
            match clause.matches(version, parsed.as_ref()) {
                Some(false) => return Some(false),
                Some(true) => {}
                None => undecided = true,
            }
        }
        if undecided {
            None
        } else {
            Some(true)
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionSpec {
    type Err = VersionSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_clause(part: &str) -> Result<Clause, String> {
    const OPERATORS: &[(&str, Op)] = &[
        ("===", Op::Arbitrary),
        ("==", Op::Eq),
        ("!=", Op::Ne),
        ("~=", Op::Compatible),
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("<", Op::Lt),
        (">", Op::Gt),
        ("=", Op::Eq),
    ];

    let (op, operand) = OPERATORS
        .iter()
        .find_map(|(prefix, op)| part.strip_prefix(prefix).map(|rest| (*op, rest.trim())))
        .unwrap_or((Op::Eq, part));

    if operand.is_empty() {
        return Err(format!("missing version after operator in `{part}`"));
    }

    if op == Op::Arbitrary {
        return Ok(Clause {
            op,
            operand: operand.to_string(),
            version: None,
            wildcard: None,
        });
    }

    if let Some(prefix) = operand.strip_suffix(".*") {
        if !matches!(op, Op::Eq | Op::Ne) {
            return Err(format!("wildcard only allowed with == or != in `{part}`"));
        }
        let segments = prefix
            .split('.')
            .map(|s| s.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| format!("invalid wildcard prefix in `{part}`"))?;
        return Ok(Clause {
            op,
            operand: operand.to_string(),
            version: None,
            wildcard: Some(segments),
        });
    }

    let version = Version::parse(operand);
    if version.is_none() && op != Op::Eq && op != Op::Ne {
        return Err(format!("`{operand}` is not a comparable version"));
    }
    if op == Op::Compatible && version.as_ref().is_some_and(|v| v.release.len() < 2) {
        return Err(format!("~= needs at least two release segments in `{part}`"));
    }

    Ok(Clause {
        op,
        operand: operand.to_string(),
        version,
        wildcard: None,
    })
}

impl Clause {
    fn matches(&self, raw: &str, version: Option<&Version>) -> Option<bool> {
        if self.op == Op::Arbitrary {
            return Some(raw.trim().eq_ignore_ascii_case(&self.operand));
        }

        if let Some(prefix) = &self.wildcard {
            let hit = version?.has_release_prefix(prefix);
            return Some(if self.op == Op::Eq { hit } else { !hit });
        }

        let (Some(actual), Some(wanted)) = (version, self.version.as_ref()) else {
            // Unparseable on either side: only (in)equality is decidable.
            let same = raw.trim().eq_ignore_ascii_case(&self.operand);
            return match self.op {
                Op::Eq => Some(same),
                Op::Ne => Some(!same),
                _ => None,
            };
        };

        let ordering = actual.cmp(wanted);
        Some(match self.op {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Lt => ordering == Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::Ge => ordering != Ordering::Less,
            Op::Compatible => {
                let prefix = &wanted.release[..wanted.release.len() - 1];
                ordering != Ordering::Less && actual.has_release_prefix(prefix)
            }
            Op::Arbitrary => raw.trim().eq_ignore_ascii_case(&self.operand),
        })
    }
}
