//! Extracts the client's requested version string from a header, a query parameter, or the
//! first path segment.

use axum::http::{HeaderName, Request};
use regex::{escape, Regex};

use crate::bundle::VersionBundle;

/// Where to look for the client's requested version. Exactly one variant is configured at
/// startup.
#[derive(Debug, Clone)]
pub enum VersionDetector {
    /// Read the configured header; empty/missing resolves to `None`.
    Header(HeaderName),
    /// Read the configured query parameter; empty/missing resolves to `None`.
    Query(String),
    /// Match the first path segment against a regex built from the bundle's known version
    /// strings, anchored to path segment boundaries.
    Path(Regex),
}

impl VersionDetector {
    /// Detector reading the `X-API-Version` header (the crate's default).
    pub fn header_default() -> Self {
        Self::Header(HeaderName::from_static("x-api-version"))
    }

    /// Detector reading a custom header name.
    pub fn header(name: HeaderName) -> Self {
        Self::Header(name)
    }

    /// Detector reading the `version` query parameter (the crate's default).
    pub fn query_default() -> Self {
        Self::Query("version".to_string())
    }

    /// Detector reading a custom query parameter name.
    pub fn query(name: impl Into<String>) -> Self {
        Self::Query(name.into())
    }

    /// Detector matching a known version string as the request's first path segment.
    pub fn path(bundle: &VersionBundle) -> Self {
        let alternation = bundle
            .versions()
            .iter()
            .map(|v| escape(v.as_str()))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"^/({alternation})(?:/|$)");
        let regex = Regex::new(&pattern).expect("version alternation compiles to a valid regex");
        Self::Path(regex)
    }

    /// Extract the raw version string the client requested, if any.
    pub fn detect<B>(&self, request: &Request<B>) -> Option<String> {
        match self {
            Self::Header(name) => request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            Self::Query(param) => {
                let query = request.uri().query()?;
                query.split('&').find_map(|pair| {
                    let mut parts = pair.splitn(2, '=');
                    let key = parts.next()?;
                    if key != param {
                        return None;
                    }
                    let value = parts.next().unwrap_or_default();
                    (!value.is_empty()).then(|| value.to_string())
                })
            }
            Self::Path(regex) => regex
                .captures(request.uri().path())
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn header_detector_reads_configured_header() {
        let detector = VersionDetector::header_default();
        let req = Request::builder()
            .header("x-api-version", "1.0.0")
            .body(Body::empty())
            .unwrap();
        assert_eq!(detector.detect(&req).as_deref(), Some("1.0.0"));
    }

    #[test]
    fn header_detector_treats_missing_as_none() {
        let detector = VersionDetector::header_default();
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(detector.detect(&req), None);
    }

    #[test]
    fn query_detector_reads_configured_param() {
        let detector = VersionDetector::query_default();
        let req = Request::builder()
            .uri("/x?version=2.0.0&other=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(detector.detect(&req).as_deref(), Some("2.0.0"));
    }

    #[test]
    fn query_detector_treats_empty_value_as_none() {
        let detector = VersionDetector::query_default();
        let req = Request::builder()
            .uri("/x?version=")
            .body(Body::empty())
            .unwrap();
        assert_eq!(detector.detect(&req), None);
    }

    #[test]
    fn path_detector_matches_first_segment() {
        let bundle = VersionBundle::new(vec![
            crate::version::Version::parse("1.0.0").unwrap(),
            crate::version::Version::parse("2.0.0").unwrap(),
        ])
        .unwrap();
        let detector = VersionDetector::path(&bundle);

        let req = Request::builder()
            .uri("/2.0.0/users")
            .body(Body::empty())
            .unwrap();
        assert_eq!(detector.detect(&req).as_deref(), Some("2.0.0"));

        let req = Request::builder()
            .uri("/users")
            .body(Body::empty())
            .unwrap();
        assert_eq!(detector.detect(&req), None);
    }
}
