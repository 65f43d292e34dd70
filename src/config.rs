//! Startup configuration gluing a [`VersionBundle`], a [`MigrationChain`], and a
//! [`VersionDetector`] together for the `tower` layers in this crate.

use axum::http::HeaderName;

use crate::{bundle::VersionBundle, detector::VersionDetector, version::Version};

/// Configuration for [`crate::middleware::VersioningLayer`], built once at application
/// startup and shared (typically behind an `Arc`) across every request.
#[derive(Debug, Clone)]
pub struct VersioningConfig {
    pub(crate) bundle: VersionBundle,
    pub(crate) detector: VersionDetector,
    pub(crate) default_version: Option<Version>,
    pub(crate) echo_header: HeaderName,
}

impl VersioningConfig {
    /// Start building a configuration from a bundle and a detector. The response echo
    /// header defaults to the detector's natural header name (the configured header name
    /// for [`VersionDetector::Header`], or `X-API-Version` otherwise).
    pub fn new(bundle: VersionBundle, detector: VersionDetector) -> Self {
        let echo_header = default_echo_header(&detector);
        Self {
            bundle,
            detector,
            default_version: None,
            echo_header,
        }
    }

    /// Set the version resolved when the client supplies none. Falls back to HEAD when unset.
    pub fn default_version(mut self, version: Version) -> Self {
        self.default_version = Some(version);
        self
    }

    /// Override the response header used to echo the resolved version.
    pub fn echo_header(mut self, name: HeaderName) -> Self {
        self.echo_header = name;
        self
    }

    pub fn bundle(&self) -> &VersionBundle {
        &self.bundle
    }
}

fn default_echo_header(detector: &VersionDetector) -> HeaderName {
    match detector {
        VersionDetector::Header(name) => name.clone(),
        VersionDetector::Query(name) => {
            HeaderName::try_from(name.as_str()).unwrap_or_else(|_| HeaderName::from_static("x-api-version"))
        }
        VersionDetector::Path(_) => HeaderName::from_static("x-api-version"),
    }
}
