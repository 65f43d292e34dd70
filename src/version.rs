//! Typed, totally-ordered API version values.

use std::{cmp::Ordering, fmt};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static SEMVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v?(\d+)\.(\d+)(?:\.(\d+))?$").expect("semver regex is valid"));

static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex is valid"));

/// The parsed shape of a [`Version`]'s raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Date(NaiveDate),
    Semver { major: u64, minor: u64, patch: u64 },
    OpaqueString,
    Head,
}

/// A single API version.
///
/// Versions are immutable once created and compare as described in the crate's
/// version algebra: [`Kind::Head`] is strictly greater than every other version;
/// [`Kind::Date`] versions sort before [`Kind::Semver`] versions; [`Kind::OpaqueString`]
/// versions (and mixed comparisons involving one) fall back to lexicographic order on
/// the raw string.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    kind: Kind,
}

impl Version {
    /// The distinguished HEAD version, against which handlers are written.
    pub fn head() -> Self {
        Self {
            raw: "head".to_string(),
            kind: Kind::Head,
        }
    }

    /// Parse a non-empty, non-`"head"` raw version string.
    ///
    /// Returns [`ParseVersionError`] if `raw` is empty or equals `"head"` (the
    /// literal is reserved and must be constructed via [`Version::head`]).
    pub fn parse(raw: impl Into<String>) -> Result<Self, ParseVersionError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ParseVersionError::Empty);
        }
        if raw == "head" {
            return Err(ParseVersionError::ReservedHead);
        }

        if DATE.is_match(&raw) {
            if let Some(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok() {
                return Ok(Self {
                    raw,
                    kind: Kind::Date(date),
                });
            }
        }

        if let Some(caps) = SEMVER.captures(&raw) {
            let major = caps[1].parse().map_err(|_| ParseVersionError::Malformed)?;
            let minor = caps[2].parse().map_err(|_| ParseVersionError::Malformed)?;
            let patch = caps
                .get(3)
                .map(|m| m.as_str().parse())
                .transpose()
                .map_err(|_| ParseVersionError::Malformed)?
                .unwrap_or(0);
            return Ok(Self {
                raw,
                kind: Kind::Semver {
                    major,
                    minor,
                    patch,
                },
            });
        }

        Ok(Self {
            raw,
            kind: Kind::OpaqueString,
        })
    }

    /// Whether this is the distinguished HEAD version.
    pub fn is_head(&self) -> bool {
        matches!(self.kind, Kind::Head)
    }

    /// The raw string this version was constructed from (`"head"` for HEAD).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn rank(&self) -> u8 {
        match self.kind {
            Kind::Date(_) => 0,
            Kind::Semver { .. } => 1,
            Kind::OpaqueString => 2,
            Kind::Head => 3,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
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
        match (&self.kind, &other.kind) {
            (Kind::Head, Kind::Head) => Ordering::Equal,
            (Kind::Date(a), Kind::Date(b)) => a.cmp(b),
            (Kind::Semver { major: am, minor: ai, patch: ap }, Kind::Semver { major: bm, minor: bi, patch: bp }) => {
                (am, ai, ap).cmp(&(bm, bi, bp))
            }
            // Any comparison touching an OpaqueString (including mixed-tag ones) falls
            // back to raw-string order; applications relying on this should prefer an
            // explicit default version over waterfall resolution.
            (Kind::OpaqueString, _) | (_, Kind::OpaqueString) => self.raw.cmp(&other.raw),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

/// Error parsing a raw version string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseVersionError {
    /// The raw string was empty.
    #[error("version string must not be empty")]
    Empty,

    /// The raw string was the reserved literal `"head"`.
    #[error("\"head\" is reserved; use Version::head()")]
    ReservedHead,

    /// The raw string looked like a semver/date but its components did not parse.
    #[error("malformed version string")]
    Malformed,
}
