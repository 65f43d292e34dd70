//! Error taxonomy for version resolution, chain planning, and migration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::version::ParseVersionError;

/// Failure constructing a [`VersionBundle`](crate::bundle::VersionBundle) or
/// [`VersionChange`](crate::change::VersionChange) at startup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The bundle was given an empty version list.
    #[error("version bundle must not be empty")]
    Empty,

    /// Two versions in the bundle shared the same raw string.
    #[error("duplicate version: {0}")]
    DuplicateVersion(String),

    /// A version string supplied at startup failed to parse.
    #[error("invalid version string: {0}")]
    InvalidVersion(#[from] ParseVersionError),

    /// The oldest (baseline) non-HEAD version owns at least one instruction.
    #[error("baseline version {0} must not carry instructions")]
    BaselineHasInstructions(String),

    /// An `AlterRequest`/`AlterResponse` instruction selected both schemas and a path,
    /// or neither.
    #[error("instruction must select exactly one of schema identities or a path template")]
    AmbiguousSelector,

    /// Two adjacent version changes in a chain do not share a `to`/`from` boundary.
    #[error("version changes are not contiguous: {0} -> {1} does not lead into {2} -> {3}")]
    NonContiguousChain(String, String, String, String),

    /// A `VersionChange`'s `from_version` was not strictly less than its `to_version`.
    #[error("version change from {0} to {1} is not strictly increasing")]
    NotIncreasing(String, String),
}

/// Failure resolving a requested version string against a bundle: no exact match, and no
/// version in the bundle is strictly less than the requested string either.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("no version lesser than {0}")]
    NoLesserVersion(String),
}

/// Failure computing or applying a migration chain plan.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// Neither `from` nor `to` is reachable along the chain.
    #[error("no migration path from {from} to {to}")]
    NoMigrationPath { from: String, to: String },
}

/// A transformer returned an error while migrating a request or response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("version change \"{change}\" failed: {source}")]
pub struct MigrationFailure {
    /// The human-readable description of the [`VersionChange`](crate::change::VersionChange)
    /// whose transformer failed.
    pub change: String,
    /// The underlying transformer error.
    #[source]
    pub source: TransformError,
}

/// Error returned by a user-supplied `AlterRequest`/`AlterResponse` transformer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Path-indexed instruction never matched a registered route.
///
/// Logged at startup via [`tracing::warn!`]; never fatal, never surfaced over HTTP.
#[derive(Debug, Clone, thiserror::Error)]
#[error("path-indexed instruction for \"{path}\" matched no registered route")]
pub struct RouteBindingError {
    pub path: String,
}

/// Either half of what can go wrong applying a [`MigrationChain`](crate::chain::MigrationChain)
/// plan: the plan could not be computed, or a transformer failed while executing it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MigrateError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Migration(#[from] MigrationFailure),
}

/// Top-level error surfaced at the axum/tower boundary.
///
/// Renders the HTTP contract described in the crate's external interfaces:
/// unknown versions become `400`, everything else becomes `500`. `MigrateError`'s two
/// cases (no migration path, transformer failure) are both folded into
/// `RequestMigrationFailed`/`ResponseMigrationFailed` by `handler.rs` before they reach
/// here, since that's the only place that knows which direction was in flight.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiVersionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("request migration failed: {0}")]
    RequestMigrationFailed(String),

    #[error("response migration failed: {0}")]
    ResponseMigrationFailed(String),
}

impl IntoResponse for ApiVersionError {
    fn into_response(self) -> Response {
        match self {
            ApiVersionError::Resolve(ResolveError::NoLesserVersion(v)) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Unknown version: {v}") })),
            )
                .into_response(),
            ApiVersionError::RequestMigrationFailed(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Request migration failed",
                    "details": details,
                })),
            )
                .into_response(),
            ApiVersionError::ResponseMigrationFailed(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Response migration failed",
                    "details": details,
                })),
            )
                .into_response(),
        }
    }
}
