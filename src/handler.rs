//! Wraps a HEAD-shaped handler to translate requests inbound and responses outbound
//! through a [`MigrationChain`].

use std::{
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{error, warn};

use crate::{
    carrier::{RequestInfo, ResponseInfo},
    chain::MigrationChain,
    error::{ApiVersionError, MigrateError},
    instruction::{RouteId, SchemaId},
    middleware::ResolvedVersion,
    version::Version,
};

/// The JSON value produced by the forward migration chain, exposed to the inner handler
/// alongside the rewritten request body.
#[derive(Debug, Clone)]
pub struct MigratedRequestBody(pub serde_json::Value);

/// `tower::Layer` wrapping one HEAD-shaped handler with request-in / response-out
/// translation, per the crate's `VersionedHandler` contract.
#[derive(Clone)]
pub struct VersionedHandlerLayer {
    chain: Arc<MigrationChain>,
    head: Version,
    route_id: Option<RouteId>,
    request_schema: Option<SchemaId>,
    response_schema: Option<SchemaId>,
}

impl VersionedHandlerLayer {
    pub fn new(chain: Arc<MigrationChain>, head: Version) -> Self {
        Self {
            chain,
            head,
            route_id: None,
            request_schema: None,
            response_schema: None,
        }
    }

    /// Associate this handler with a route bound by the
    /// [`RouteBinder`](crate::route::RouteBinder), activating path-indexed instructions.
    pub fn route(mut self, route_id: RouteId) -> Self {
        self.route_id = Some(route_id);
        self
    }

    /// Associate this handler's request payload with a schema identity, activating
    /// schema-indexed `AlterRequest` instructions.
    pub fn request_schema(mut self, schema: impl Into<SchemaId>) -> Self {
        self.request_schema = Some(schema.into());
        self
    }

    /// Associate this handler's response payload with a schema identity, activating
    /// schema-indexed `AlterResponse` instructions.
    pub fn response_schema(mut self, schema: impl Into<SchemaId>) -> Self {
        self.response_schema = Some(schema.into());
        self
    }
}

impl<S> Layer<S> for VersionedHandlerLayer {
    type Service = VersionedHandlerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        VersionedHandlerService {
            inner,
            chain: self.chain.clone(),
            head: self.head.clone(),
            route_id: self.route_id,
            request_schema: self.request_schema.clone(),
            response_schema: self.response_schema.clone(),
        }
    }
}

/// See [`VersionedHandlerLayer`].
#[derive(Clone)]
pub struct VersionedHandlerService<S> {
    inner: S,
    chain: Arc<MigrationChain>,
    head: Version,
    route_id: Option<RouteId>,
    request_schema: Option<SchemaId>,
    response_schema: Option<SchemaId>,
}

const UNBOUNDED: usize = usize::MAX;

impl<S> Service<Request> for VersionedHandlerService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let chain = self.chain.clone();
        let head = self.head.clone();
        let route_id = self.route_id;
        let request_schema = self.request_schema.clone();
        let response_schema = self.response_schema.clone();

        Box::pin(async move {
            let version = request
                .extensions()
                .get::<ResolvedVersion>()
                .map(|r| r.0.clone());

            let version = match version {
                Some(v) if !v.is_head() => v,
                _ => return inner.call(request).await,
            };

            let (mut parts, body) = request.into_parts();
            let bytes = match to_bytes(body, UNBOUNDED).await {
                Ok(b) => b,
                Err(_) => {
                    // Body could not be read at all; nothing to translate, pass through empty.
                    let request = Request::from_parts(parts, Body::empty());
                    return inner.call(request).await;
                }
            };

            let request = if bytes.is_empty() {
                Request::from_parts(parts, Body::empty())
            } else {
                match serde_json::from_slice::<serde_json::Value>(&bytes) {
                    Err(_) => {
                        // Not JSON: translation is only defined for JSON bodies.
                        Request::from_parts(parts, Body::from(bytes))
                    }
                    Ok(value) => {
                        let mut info = RequestInfo::new(
                            value,
                            parts.headers.clone(),
                            parts.method.clone(),
                            parts.uri.clone(),
                        );
                        match chain.apply_request(
                            &mut info,
                            &version,
                            &head,
                            request_schema.as_ref(),
                            route_id,
                        ) {
                            Ok(()) => {
                                let encoded = match serde_json::to_vec(&info.body) {
                                    Ok(bytes) => bytes,
                                    Err(error) => {
                                        error!(%error, "failed to re-encode migrated request body");
                                        return Ok(ApiVersionError::RequestMigrationFailed(
                                            error.to_string(),
                                        )
                                        .into_response());
                                    }
                                };
                                parts.extensions.insert(MigratedRequestBody(info.body.clone()));
                                set_content_length(&mut parts.headers, encoded.len());
                                Request::from_parts(parts, Body::from(encoded))
                            }
                            Err(failure) => {
                                return Ok(ApiVersionError::RequestMigrationFailed(
                                    migrate_error_details(failure),
                                )
                                .into_response());
                            }
                        }
                    }
                }
            };

            let response = inner.call(request).await?;
            let (parts, body) = response.into_parts();
            let bytes = match to_bytes(body, UNBOUNDED).await {
                Ok(b) => b,
                Err(error) => {
                    warn!(%error, "failed to buffer response body for version translation");
                    return Ok(Response::from_parts(parts, Body::empty()));
                }
            };

            if bytes.is_empty() {
                return Ok(Response::from_parts(parts, Body::empty()));
            }

            let value = match serde_json::from_slice::<serde_json::Value>(&bytes) {
                Err(_) => return Ok(Response::from_parts(parts, Body::from(bytes))),
                Ok(value) => value,
            };

            let mut info = ResponseInfo::new(value, parts.status, parts.headers.clone());
            if let Err(failure) = chain.apply_response(
                &mut info,
                &head,
                &version,
                response_schema.as_ref(),
                route_id,
            ) {
                return Ok(ApiVersionError::ResponseMigrationFailed(migrate_error_details(failure))
                    .into_response());
            }

            let encoded = match serde_json::to_vec(&info.body) {
                Ok(bytes) => bytes,
                Err(error) => {
                    error!(%error, "failed to re-encode migrated response body");
                    return Ok(ApiVersionError::ResponseMigrationFailed(error.to_string())
                        .into_response());
                }
            };

            let mut headers = info.headers;
            for cookie in &info.set_cookies {
                if let Ok(value) = HeaderValue::from_str(cookie) {
                    headers.append(axum::http::header::SET_COOKIE, value);
                }
            }
            set_content_length(&mut headers, encoded.len());

            let mut response = Response::new(Body::from(encoded));
            *response.status_mut() = info.status;
            *response.headers_mut() = headers;
            Ok(response)
        })
    }
}

fn migrate_error_details(error: MigrateError) -> String {
    error.to_string()
}

fn set_content_length(headers: &mut axum::http::HeaderMap, len: usize) {
    headers.insert(
        axum::http::header::CONTENT_LENGTH,
        HeaderValue::from_str(&len.to_string()).expect("integer formats to a valid header value"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bundle::VersionBundle,
        change::VersionChange,
        instruction::{AlterRequest, AlterResponse, Instruction, Selector},
        middleware::{ResolvedVersion},
    };
    use axum::{routing::post, Router};
    use tower::ServiceExt;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn name_split_chain() -> Arc<MigrationChain> {
        let change = VersionChange::new(
            "split name into first/last",
            v("1.0.0"),
            Version::head(),
            vec![
                Instruction::AlterRequest(AlterRequest::new(
                    Selector::schemas([SchemaId::new("User")]),
                    |req| {
                        if let Some(name) = req.body.get("name").and_then(|n| n.as_str()).map(str::to_string) {
                            req.body["first_name"] = serde_json::json!(name);
                            req.body["last_name"] = serde_json::json!(name);
                            req.body.as_object_mut().unwrap().remove("name");
                        }
                        Ok(())
                    },
                )),
                Instruction::AlterResponse(AlterResponse::new(
                    Selector::schemas([SchemaId::new("User")]),
                    |resp| {
                        let first = resp.body.get("first_name").and_then(|v| v.as_str()).unwrap_or_default();
                        let last = resp.body.get("last_name").and_then(|v| v.as_str()).unwrap_or_default();
                        resp.body["name"] = serde_json::json!(format!("{first} {last}"));
                        Ok(())
                    },
                )),
            ],
        )
        .unwrap();
        Arc::new(MigrationChain::new(vec![change]).unwrap())
    }

    async fn head_handler(body: axum::body::Bytes) -> Response {
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let first = value["first_name"].as_str().unwrap_or_default();
        let last = value["last_name"].as_str().unwrap_or_default();
        axum::Json(serde_json::json!({
            "id": 1,
            "first_name": first,
            "last_name": last,
        }))
        .into_response()
    }

    #[tokio::test]
    async fn translates_request_forward_and_response_backward() {
        let chain = name_split_chain();
        let layer = VersionedHandlerLayer::new(chain, Version::head())
            .request_schema(SchemaId::new("User"))
            .response_schema(SchemaId::new("User"));

        let app = Router::new().route("/users", post(head_handler)).layer(
            tower::util::MapRequestLayer::new(move |mut req: Request| {
                req.extensions_mut()
                    .insert(ResolvedVersion(v("1.0.0")));
                req
            }),
        );
        let app = layer.layer(app);

        let request = Request::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"John Doe"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let bytes = to_bytes(response.into_body(), UNBOUNDED).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["id"], serde_json::json!(1));
        assert_eq!(value["name"], serde_json::json!("John Doe John Doe"));
        assert!(value.get("first_name").is_none());
    }

    #[tokio::test]
    async fn head_version_bypasses_translation() {
        let chain = name_split_chain();
        let layer = VersionedHandlerLayer::new(chain, Version::head())
            .request_schema(SchemaId::new("User"))
            .response_schema(SchemaId::new("User"));

        let app = Router::new().route("/users", post(head_handler)).layer(
            tower::util::MapRequestLayer::new(move |mut req: Request| {
                req.extensions_mut().insert(ResolvedVersion(Version::head()));
                req
            }),
        );
        let app = layer.layer(app);

        let request = Request::builder()
            .method("POST")
            .uri("/users")
            .body(Body::from(r#"{"first_name":"A","last_name":"B"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let bytes = to_bytes(response.into_body(), UNBOUNDED).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["first_name"], serde_json::json!("A"));
        assert!(value.get("name").is_none());
    }
}
