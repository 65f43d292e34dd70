//! Ownership of the ordered version set and resolution of raw version strings against it.

use std::collections::HashSet;

use crate::{
    error::{ConfigError, ResolveError},
    version::Version,
};

/// The immutable, ordered set of versions an application publishes, plus the distinguished
/// HEAD version.
#[derive(Debug, Clone)]
pub struct VersionBundle {
    /// Non-HEAD versions, oldest first.
    versions: Vec<Version>,
    head: Version,
    known: HashSet<String>,
}

impl VersionBundle {
    /// Build a bundle from a non-empty list of versions.
    ///
    /// If the first element is HEAD it is adopted as the bundle's HEAD; otherwise a HEAD is
    /// synthesized and every given version is treated as non-HEAD. Fails if the input is
    /// empty or contains a duplicate raw string.
    pub fn new(versions: Vec<Version>) -> Result<Self, ConfigError> {
        if versions.is_empty() {
            return Err(ConfigError::Empty);
        }

        let (head, versions) = if versions[0].is_head() {
            (versions[0].clone(), versions[1..].to_vec())
        } else {
            (Version::head(), versions)
        };

        let mut known = HashSet::with_capacity(versions.len());
        for v in &versions {
            if !known.insert(v.as_str().to_string()) {
                return Err(ConfigError::DuplicateVersion(v.as_str().to_string()));
            }
        }

        let mut versions = versions;
        versions.sort();

        Ok(Self {
            versions,
            head,
            known,
        })
    }

    /// Build a bundle by parsing a list of raw version strings, oldest first.
    ///
    /// Convenience over [`VersionBundle::new`] for the common case where an application
    /// keeps its published versions as plain strings; any string that fails to parse
    /// surfaces as [`ConfigError::InvalidVersion`].
    pub fn from_raw_strings<I, S>(raw: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let versions = raw
            .into_iter()
            .map(|s| Version::parse(s.as_ref().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(versions)
    }

    /// The distinguished HEAD version.
    pub fn head(&self) -> &Version {
        &self.head
    }

    /// All non-HEAD versions, oldest first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// The oldest non-HEAD version, i.e. the baseline that must carry no instructions.
    pub fn oldest(&self) -> &Version {
        &self.versions[0]
    }

    /// `true` if `raw` names a known non-HEAD version (exact raw-string match).
    pub fn contains(&self, raw: &str) -> bool {
        self.known.contains(raw)
    }

    /// Resolve a raw version string to a [`Version`] in this bundle.
    ///
    /// The literal `"head"` and the empty string resolve to HEAD. Otherwise, an exact
    /// raw-string match is returned if found; exact non-matches are the caller's concern
    /// (see [`VersionBundle::resolve_with_waterfall`] for the fallback policy).
    pub fn resolve_exact(&self, raw: &str) -> Option<Version> {
        if raw.is_empty() || raw == "head" {
            return Some(self.head.clone());
        }
        self.versions.iter().find(|v| v.as_str() == raw).cloned()
    }

    /// Resolve a raw version string, falling back to the closest lesser known version when
    /// there is no exact match.
    pub fn resolve_with_waterfall(&self, raw: &str) -> Result<Version, ResolveError> {
        if let Some(exact) = self.resolve_exact(raw) {
            return Ok(exact);
        }
        self.closest_lesser(raw)
            .ok_or_else(|| ResolveError::NoLesserVersion(raw.to_string()))
    }

    /// The non-HEAD version with the greatest value strictly less than `raw`.
    ///
    /// `raw` is parsed transiently for comparison purposes only; it need not itself be a
    /// member of the bundle.
    pub fn closest_lesser(&self, raw: &str) -> Option<Version> {
        let target = Version::parse(raw).ok()?;
        self.versions
            .iter()
            .filter(|v| **v < target)
            .max()
            .cloned()
    }
}
