//! The version-detecting `tower` middleware: resolves the client's version, stores it in
//! request extensions, and echoes it on the response.

use std::{
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::debug;

use crate::{
    config::VersioningConfig,
    error::ApiVersionError,
    version::Version,
};

/// The version resolved for this request, stored in `request.extensions()` by
/// [`VersioningService`] and read back by [`crate::handler::VersionedHandlerService`].
#[derive(Debug, Clone)]
pub struct ResolvedVersion(pub Version);

/// Whether [`ResolvedVersion`] came from the configured default rather than an explicit
/// client-supplied version string.
#[derive(Debug, Clone, Copy)]
pub struct DefaultVersionUsed(pub bool);

/// `tower::Layer` that resolves the client's API version for every request.
///
/// See the crate's version-detecting middleware contract: detect → default-or-waterfall →
/// store in request scope → echo on the response.
#[derive(Clone)]
pub struct VersioningLayer {
    config: Arc<VersioningConfig>,
}

impl VersioningLayer {
    pub fn new(config: VersioningConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for VersioningLayer {
    type Service = VersioningService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        VersioningService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// See [`VersioningLayer`].
#[derive(Clone)]
pub struct VersioningService<S> {
    inner: S,
    config: Arc<VersioningConfig>,
}

impl<S> Service<Request> for VersioningService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let requested = config.detector.detect(&request);

            let (resolved, default_used) = match requested {
                None => {
                    let fallback = config
                        .default_version
                        .clone()
                        .unwrap_or_else(|| config.bundle.head().clone());
                    (fallback, true)
                }
                Some(raw) => match config.bundle.resolve_with_waterfall(&raw) {
                    Ok(v) => (v, false),
                    Err(err) => return Ok(ApiVersionError::Resolve(err).into_response()),
                },
            };

            debug!(version = %resolved, default_used, "resolved API version");

            request.extensions_mut().insert(ResolvedVersion(resolved.clone()));
            request
                .extensions_mut()
                .insert(DefaultVersionUsed(default_used));

            let mut response = inner.call(request).await?;

            if let Ok(value) = resolved.as_str().parse() {
                response.headers_mut().insert(config.echo_header.clone(), value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bundle::VersionBundle, detector::VersionDetector};
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn config() -> VersioningConfig {
        let bundle = VersionBundle::new(vec![
            Version::parse("1.0.0").unwrap(),
            Version::parse("2.0.0").unwrap(),
        ])
        .unwrap();
        VersioningConfig::new(bundle, VersionDetector::header_default())
    }

    async fn echo_version(ext: axum::Extension<ResolvedVersion>) -> String {
        ext.0 .0.as_str().to_string()
    }

    #[tokio::test]
    async fn resolves_explicit_version_and_echoes_header() {
        let app = Router::new().route("/", get(echo_version));
        let app = VersioningLayer::new(config()).layer(app);

        let request = axum::http::Request::builder()
            .uri("/")
            .header("x-api-version", "1.0.0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-api-version").unwrap(),
            "1.0.0"
        );
    }

    #[tokio::test]
    async fn falls_back_to_default_version() {
        let app = Router::new().route("/", get(echo_version));
        let cfg = config().default_version(Version::parse("2.0.0").unwrap());
        let app = VersioningLayer::new(cfg).layer(app);

        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("x-api-version").unwrap(),
            "2.0.0"
        );
    }

    #[tokio::test]
    async fn rejects_unknown_version_with_400() {
        let app = Router::new().route("/", get(echo_version));
        let app = VersioningLayer::new(config()).layer(app);

        let request = axum::http::Request::builder()
            .uri("/")
            .header("x-api-version", "9.9.9")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn waterfall_resolves_to_closest_lesser_version() {
        let app = Router::new().route("/", get(echo_version));
        let app = VersioningLayer::new(config()).layer(app);

        let request = axum::http::Request::builder()
            .uri("/")
            .header("x-api-version", "1.5.0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-api-version").unwrap(),
            "1.0.0"
        );
    }
}
