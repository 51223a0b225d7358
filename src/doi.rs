//! Digital Object Identifier normalization (SPEC_FULL.md §4.1).

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn doi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^10\.\d{4,}/\S+$").expect("valid DOI regex"))
}

const STRIPPED_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// A normalized Digital Object Identifier.
///
/// Two `Doi` values compare equal iff their normalized forms are byte-equal.
/// Normalization is idempotent: re-parsing a `Doi`'s canonical URL form yields
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Doi(String);

impl Doi {
    /// Parse a candidate string into a normalized DOI.
    ///
    /// Returns `None` when the input, after trimming and prefix-stripping,
    /// does not match the DOI shape `10.<registrant>/<suffix>`.
    #[must_use]
    pub fn parse(candidate: &str) -> Option<Self> {
        let trimmed = candidate.trim();
        let mut stripped = trimmed;
        for prefix in STRIPPED_PREFIXES {
            if stripped.len() >= prefix.len()
                && stripped[..prefix.len()].eq_ignore_ascii_case(prefix)
            {
                stripped = &stripped[prefix.len()..];
                break;
            }
        }
        let lowered = stripped.to_lowercase();
        if doi_pattern().is_match(&lowered) {
            Some(Self(lowered))
        } else {
            None
        }
    }

    /// Construct a `Doi` from an already-normalized string without re-validating.
    /// Adapter-internal use only, for values taken verbatim from a provider's
    /// own DOI field when that provider guarantees normalized output.
    #[must_use]
    pub fn trusted(normalized: impl Into<String>) -> Self {
        Self(normalized.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn to_url(&self) -> String {
        format!("https://doi.org/{}", self.0)
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Doi {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Doi {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Doi::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid DOI: {s}")))
    }
}
