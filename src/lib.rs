//! Request/response JSON version translation for `axum` APIs.
//!
//! An API owner writes handlers against a single current schema ("HEAD"). Clients keep
//! sending and receiving payloads shaped for older published versions. This crate detects
//! the client's version with [`VersioningLayer`], migrates the inbound request forward to
//! HEAD and the outbound response back to the client's shape with
//! [`VersionedHandlerLayer`], and composes version changes into chains with
//! [`MigrationChain`].
//!
//! The pieces, roughly in the order an application wires them up:
//!
//! - [`Version`] / [`VersionBundle`]: the set of published version strings and how they compare.
//! - [`VersionChange`] / [`Instruction`]: one version boundary's request/response transformers,
//!   plus the descriptive schema/endpoint/enum edits documentation tooling can read.
//! - [`MigrationChain`]: an ordered sequence of changes with forward/backward plan computation.
//! - [`VersionDetector`] / [`VersioningConfig`] / [`VersioningLayer`]: resolve a client's version
//!   once per request and stash it in request extensions.
//! - [`VersionedHandlerLayer`]: wraps one HEAD-shaped handler with request-in / response-out
//!   translation through a [`MigrationChain`].
//! - [`RouteBinder`]: binds path-indexed instructions to concrete registered routes at startup.

pub mod bundle;
pub mod carrier;
pub mod chain;
pub mod change;
pub mod config;
pub mod detector;
pub mod error;
pub mod handler;
pub mod instruction;
pub mod middleware;
pub mod route;
pub mod version;

pub use bundle::VersionBundle;
pub use carrier::{RequestInfo, ResponseInfo};
pub use chain::MigrationChain;
pub use change::VersionChange;
pub use config::VersioningConfig;
pub use detector::VersionDetector;
pub use error::{
    ApiVersionError, ChainError, ConfigError, MigrateError, MigrationFailure, ResolveError,
    RouteBindingError, TransformError,
};
pub use handler::{MigratedRequestBody, VersionedHandlerLayer, VersionedHandlerService};
pub use instruction::{
    AlterRequest, AlterResponse, EndpointEdit, EnumEdit, Instruction, RequestTransform,
    ResponseTransform, RouteId, SchemaEdit, SchemaEditOp, SchemaId, Selector,
};
pub use middleware::{DefaultVersionUsed, ResolvedVersion, VersioningLayer, VersioningService};
pub use route::RouteBinder;
pub use version::{ParseVersionError, Version};

// Re-exported so callers can write `.layer(...)` without a separate `use tower::Layer`.
pub use tower::Layer;
