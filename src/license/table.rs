//! Static license data: canonical identifiers, known aliases, and keyword
//! fallback rules. Everything the normalizer knows lives here.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Coarse obligation class of a canonical license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LicenseRisk {
    Permissive,
    WeakCopyleft,
    StrongCopyleft,
    Unknown,
}

impl std::fmt::Display for LicenseRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseRisk::Permissive => write!(f, "Permissive"),
            LicenseRisk::WeakCopyleft => write!(f, "Weak Copyleft"),
            LicenseRisk::StrongCopyleft => write!(f, "Strong Copyleft"),
            LicenseRisk::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Every canonical identifier the normalizer can produce.
const CANONICAL: &[(&str, LicenseRisk)] = &[
    // Permissive
    ("MIT", LicenseRisk::Permissive),
    ("MIT-0", LicenseRisk::Permissive),
    ("Apache-1.1", LicenseRisk::Permissive),
    ("Apache-2.0", LicenseRisk::Permissive),
    ("BSD-2-Clause", LicenseRisk::Permissive),
    ("BSD-3-Clause", LicenseRisk::Permissive),
    ("BSD-4-Clause", LicenseRisk::Permissive),
    ("0BSD", LicenseRisk::Permissive),
    ("ISC", LicenseRisk::Permissive),
    ("Zlib", LicenseRisk::Permissive),
    ("Unlicense", LicenseRisk::Permissive),
    ("CC0-1.0", LicenseRisk::Permissive),
    ("CC-BY-4.0", LicenseRisk::Permissive),
    ("PSF-2.0", LicenseRisk::Permissive),
    ("Python-2.0", LicenseRisk::Permissive),
    ("HPND", LicenseRisk::Permissive),
    ("BSL-1.0", LicenseRisk::Permissive),
    ("WTFPL", LicenseRisk::Permissive),
    ("Artistic-2.0", LicenseRisk::Permissive),
    // Weak copyleft
    ("LGPL-2.0", LicenseRisk::WeakCopyleft),
    ("LGPL-2.1", LicenseRisk::WeakCopyleft),
    ("LGPL-3.0", LicenseRisk::WeakCopyleft),
    ("MPL-1.1", LicenseRisk::WeakCopyleft),
    ("MPL-2.0", LicenseRisk::WeakCopyleft),
    ("EPL-1.0", LicenseRisk::WeakCopyleft),
    ("EPL-2.0", LicenseRisk::WeakCopyleft),
    ("CDDL-1.0", LicenseRisk::WeakCopyleft),
    ("EUPL-1.2", LicenseRisk::WeakCopyleft),
    // Strong copyleft
    ("GPL-2.0", LicenseRisk::StrongCopyleft),
    ("GPL-3.0", LicenseRisk::StrongCopyleft),
    ("AGPL-3.0", LicenseRisk::StrongCopyleft),
];

/// Known raw spellings, already in preprocessed (lowercase, single-spaced) form.
const ALIASES: &[(&str, &str)] = &[
    // MIT
    ("mit license", "MIT"),
    ("the mit license", "MIT"),
    ("mit-license", "MIT"),
    ("expat", "MIT"),
    ("expat license", "MIT"),
    ("mit no attribution", "MIT-0"),
    // Apache
    ("apache 2", "Apache-2.0"),
    ("apache 2.0", "Apache-2.0"),
    ("apache-2", "Apache-2.0"),
    ("apache2", "Apache-2.0"),
    ("apache license 2.0", "Apache-2.0"),
    ("apache license, version 2.0", "Apache-2.0"),
    ("apache software license", "Apache-2.0"),
    ("apache software license 2.0", "Apache-2.0"),
    ("asl 2.0", "Apache-2.0"),
    ("apache license 1.1", "Apache-1.1"),
    // BSD
    ("bsd", "BSD-3-Clause"),
    ("bsd license", "BSD-3-Clause"),
    ("bsd 3-clause", "BSD-3-Clause"),
    ("bsd-3", "BSD-3-Clause"),
    ("3-clause bsd", "BSD-3-Clause"),
    ("new bsd", "BSD-3-Clause"),
    ("new bsd license", "BSD-3-Clause"),
    ("modified bsd", "BSD-3-Clause"),
    ("revised bsd", "BSD-3-Clause"),
    ("bsd 2-clause", "BSD-2-Clause"),
    ("bsd-2", "BSD-2-Clause"),
    ("2-clause bsd", "BSD-2-Clause"),
    ("simplified bsd", "BSD-2-Clause"),
    ("freebsd", "BSD-2-Clause"),
    ("bsd zero clause license", "0BSD"),
    // GPL family
    ("gpl", "GPL-3.0"),
    ("gpl v2", "GPL-2.0"),
    ("gplv2", "GPL-2.0"),
    ("gpl-2.0-only", "GPL-2.0"),
    ("gpl-2.0-or-later", "GPL-2.0"),
    ("gpl-2.0+", "GPL-2.0"),
    ("gnu gpl v2", "GPL-2.0"),
    ("gnu general public license v2", "GPL-2.0"),
    ("gnu general public license v2 (gplv2)", "GPL-2.0"),
    ("gnu general public license v2 or later (gplv2+)", "GPL-2.0"),
    ("gpl v3", "GPL-3.0"),
    ("gplv3", "GPL-3.0"),
    ("gpl-3.0-only", "GPL-3.0"),
    ("gpl-3.0-or-later", "GPL-3.0"),
    ("gpl-3.0+", "GPL-3.0"),
    ("gnu gpl v3", "GPL-3.0"),
    ("gnu general public license v3", "GPL-3.0"),
    ("gnu general public license v3 (gplv3)", "GPL-3.0"),
    ("gnu general public license v3 or later (gplv3+)", "GPL-3.0"),
    ("gnu general public license (gpl)", "GPL-3.0"),
    ("lgpl", "LGPL-2.1"),
    ("lgpl v2.1", "LGPL-2.1"),
    ("lgplv2.1", "LGPL-2.1"),
    ("lgpl-2.1-only", "LGPL-2.1"),
    ("lgpl-2.1-or-later", "LGPL-2.1"),
    ("lgpl-2.1+", "LGPL-2.1"),
    ("gnu lgpl v2.1", "LGPL-2.1"),
    ("gnu library or lesser general public license (lgpl)", "LGPL-2.1"),
    ("gnu lesser general public license v2 (lgplv2)", "LGPL-2.0"),
    ("gnu lesser general public license v2 or later (lgplv2+)", "LGPL-2.0"),
    ("lgpl-2.0-only", "LGPL-2.0"),
    ("lgpl-2.0-or-later", "LGPL-2.0"),
    ("lgpl v3", "LGPL-3.0"),
    ("lgplv3", "LGPL-3.0"),
    ("lgpl-3.0-only", "LGPL-3.0"),
    ("lgpl-3.0-or-later", "LGPL-3.0"),
    ("gnu lgpl v3", "LGPL-3.0"),
    ("gnu lesser general public license v3 (lgplv3)", "LGPL-3.0"),
    ("gnu lesser general public license v3 or later (lgplv3+)", "LGPL-3.0"),
    ("agpl v3", "AGPL-3.0"),
    ("agplv3", "AGPL-3.0"),
    ("agpl-3.0-only", "AGPL-3.0"),
    ("agpl-3.0-or-later", "AGPL-3.0"),
    ("gnu agpl v3", "AGPL-3.0"),
    ("gnu affero general public license v3", "AGPL-3.0"),
    ("gnu affero general public license v3 or later (agplv3+)", "AGPL-3.0"),
    // MPL
    ("mpl 2.0", "MPL-2.0"),
    ("mplv2", "MPL-2.0"),
    ("mpl-2", "MPL-2.0"),
    ("mozilla public license 2.0", "MPL-2.0"),
    ("mozilla public license 2.0 (mpl 2.0)", "MPL-2.0"),
    ("mozilla public license 1.1 (mpl 1.1)", "MPL-1.1"),
    // Others
    ("isc license", "ISC"),
    ("isc license (iscl)", "ISC"),
    ("iscl", "ISC"),
    ("zlib/libpng", "Zlib"),
    ("zlib/libpng license", "Zlib"),
    ("the unlicense", "Unlicense"),
    ("the unlicense (unlicense)", "Unlicense"),
    ("cc0", "CC0-1.0"),
    ("cc0 1.0 universal", "CC0-1.0"),
    ("cc0 1.0 universal (cc0 1.0) public domain dedication", "CC0-1.0"),
    ("public domain", "CC0-1.0"),
    ("psf", "PSF-2.0"),
    ("psfl", "PSF-2.0"),
    ("psf license", "PSF-2.0"),
    ("python software foundation license", "PSF-2.0"),
    ("historical permission notice and disclaimer (hpnd)", "HPND"),
    ("boost software license 1.0 (bsl-1.0)", "BSL-1.0"),
    ("eclipse public license 1.0", "EPL-1.0"),
    ("eclipse public license 2.0", "EPL-2.0"),
    ("eclipse public license 2.0 (epl-2.0)", "EPL-2.0"),
    ("european union public licence 1.2 (eupl 1.2)", "EUPL-1.2"),
    ("common development and distribution license 1.0 (cddl-1.0)", "CDDL-1.0"),
    ("artistic license", "Artistic-2.0"),
];

/// Keyword rules tried, in order, when no alias matches exactly.
/// More specific families come before the ones they contain (AGPL/LGPL before GPL).
const FALLBACK_RULES: &[(&str, &str)] = &[
    (r"\bagpl\b.*(?:\b|v)3\b|\baffero\b", "AGPL-3.0"),
    (r"\blgpl\b.*(?:\b|v)2\.1\b|\blesser general public license\b.*(?:\b|v)2\.1\b", "LGPL-2.1"),
    (r"\blgpl\b.*(?:\b|v)3\b|\blesser general public license\b.*(?:\b|v)3\b", "LGPL-3.0"),
    (r"\blgpl\b|\blesser general public license\b", "LGPL-2.1"),
    (r"\bgpl\b.*(?:\b|v)3\b|\bgeneral public license\b.*(?:\b|v)3\b", "GPL-3.0"),
    (r"\bgpl\b.*(?:\b|v)2\b|\bgeneral public license\b.*(?:\b|v)2\b", "GPL-2.0"),
    (r"\bapache\b.*(?:\b|v)2\b", "Apache-2.0"),
    (r"\bmit\b", "MIT"),
    (r"\bbsd\b.*\b(?:2|two|simplified)\b", "BSD-2-Clause"),
    (r"\bbsd\b.*\b(?:3|three|new|modified|revised)\b", "BSD-3-Clause"),
    (r"\bmozilla public license\b.*(?:\b|v)2\b|\bmpl\b.*(?:\b|v)2\b", "MPL-2.0"),
    (r"\bpsf\b|\bpython software foundation\b", "PSF-2.0"),
    (r"\bpublic domain\b", "CC0-1.0"),
    (r"\bisc\b", "ISC"),
];

fn alias_map() -> &'static HashMap<String, &'static str> {
    static MAP: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut map: HashMap<String, &'static str> = ALIASES
            .iter()
            .map(|(alias, id)| (alias.to_string(), *id))
            .collect();
        // A canonical identifier always maps to itself.
        for (id, _) in CANONICAL {
            map.insert(id.to_lowercase(), *id);
        }
        map
    })
}

fn fallback_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        FALLBACK_RULES
            .iter()
            .filter_map(|(pattern, id)| Regex::new(pattern).ok().map(|re| (re, *id)))
            .collect()
    })
}

/// Exact lookup of a preprocessed key.
pub fn lookup(key: &str) -> Option<&'static str> {
    alias_map().get(key).copied()
}

/// First keyword rule matching a preprocessed key.
pub fn fallback(key: &str) -> Option<&'static str> {
    fallback_rules()
        .iter()
        .find(|(re, _)| re.is_match(key))
        .map(|(_, id)| *id)
}

/// Risk class of a canonical identifier.
pub fn risk_of(id: &str) -> LicenseRisk {
    CANONICAL
        .iter()
        .find(|(canonical, _)| *canonical == id)
        .map(|(_, risk)| *risk)
        .unwrap_or(LicenseRisk::Unknown)
}

/// All canonical identifiers, in table order.
#[cfg(test)]
pub fn canonical_ids() -> impl Iterator<Item = &'static str> {
    CANONICAL.iter().map(|(id, _)| *id)
}
