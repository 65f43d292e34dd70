//! The closed instruction variant set: operational (`AlterRequest`/`AlterResponse`) and
//! descriptive (`SchemaEdit`/`EndpointEdit`/`EnumEdit`) instructions that make up a
//! [`VersionChange`](crate::change::VersionChange).

use std::{
    collections::HashSet,
    fmt,
    sync::Arc,
};

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::{
    carrier::{RequestInfo, ResponseInfo},
    error::TransformError,
};

/// Opaque handle naming an application payload schema (e.g. `"User"`, `"Order"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(String);

impl SchemaId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SchemaId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Stable identifier assigned to a registered `(Method, path pattern)` pair by the
/// [`RouteBinder`](crate::route::RouteBinder). Opaque and unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub(crate) u64);

/// Selects which requests/responses an `AlterRequest`/`AlterResponse` instruction applies to.
///
/// Exactly one of the two forms is used by any given instruction: either a set of payload
/// schema identities, or a path template together with the HTTP methods it covers.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Fires for every request/response whose decoded body type matches one of these schemas.
    Schemas(HashSet<SchemaId>),

    /// Fires for every request/response against a route matching this path template and
    /// method set, once bound by the [`RouteBinder`](crate::route::RouteBinder).
    Path {
        path: String,
        methods: HashSet<Method>,
    },
}

impl Selector {
    pub fn schemas(schemas: impl IntoIterator<Item = SchemaId>) -> Self {
        Self::Schemas(schemas.into_iter().collect())
    }

    pub fn path(path: impl Into<String>, methods: impl IntoIterator<Item = Method>) -> Self {
        Self::Path {
            path: path.into(),
            methods: methods.into_iter().collect(),
        }
    }

    pub fn schema_ids(&self) -> Option<&HashSet<SchemaId>> {
        match self {
            Self::Schemas(s) => Some(s),
            Self::Path { .. } => None,
        }
    }

    pub fn path_template(&self) -> Option<&str> {
        match self {
            Self::Path { path, .. } => Some(path),
            Self::Schemas(_) => None,
        }
    }

    /// Whether this selector's path template equals `path` and its method set either is
    /// empty (matches any method) or contains `method`.
    pub fn matches_route(&self, method: &Method, path: &str) -> bool {
        match self {
            Self::Path { path: template, methods } => {
                template == path && (methods.is_empty() || methods.contains(method))
            }
            Self::Schemas(_) => false,
        }
    }
}

/// A user-supplied transformer over a [`RequestInfo`].
pub type RequestTransform = Arc<dyn Fn(&mut RequestInfo) -> Result<(), TransformError> + Send + Sync>;

/// A user-supplied transformer over a [`ResponseInfo`].
pub type ResponseTransform = Arc<dyn Fn(&mut ResponseInfo) -> Result<(), TransformError> + Send + Sync>;

/// An operational instruction that rewrites a request on its way to HEAD.
#[derive(Clone)]
pub struct AlterRequest {
    pub selector: Selector,
    pub transform: RequestTransform,
}

impl fmt::Debug for AlterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlterRequest")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl AlterRequest {
    pub fn new<F>(selector: Selector, transform: F) -> Self
    where
        F: Fn(&mut RequestInfo) -> Result<(), TransformError> + Send + Sync + 'static,
    {
        Self {
            selector,
            transform: Arc::new(transform),
        }
    }
}

/// An operational instruction that rewrites a response on its way back to the client.
#[derive(Clone)]
pub struct AlterResponse {
    pub selector: Selector,
    pub transform: ResponseTransform,
    /// Whether this instruction still fires for responses with `status >= 300`. Defaults to
    /// `false`, preserving framework-generated error payloads that have no meaningful
    /// version shape.
    pub migrate_http_errors: bool,
}

impl fmt::Debug for AlterResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlterResponse")
            .field("selector", &self.selector)
            .field("migrate_http_errors", &self.migrate_http_errors)
            .finish_non_exhaustive()
    }
}

impl AlterResponse {
    pub fn new<F>(selector: Selector, transform: F) -> Self
    where
        F: Fn(&mut ResponseInfo) -> Result<(), TransformError> + Send + Sync + 'static,
    {
        Self {
            selector,
            transform: Arc::new(transform),
            migrate_http_errors: false,
        }
    }

    pub fn migrate_http_errors(mut self, migrate: bool) -> Self {
        self.migrate_http_errors = migrate;
        self
    }
}

/// A declarative edit to a named payload schema. Descriptive only: consumed by
/// documentation/route-generation collaborators, never executed by the engine.
///
/// `Serialize`/`Deserialize` let those collaborators (changelog rendering, an OpenAPI
/// diff, ...) move a `SchemaEdit` across a process boundary instead of linking against
/// this crate directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaEdit {
    pub schema: SchemaId,
    pub op: SchemaEditOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaEditOp {
    FieldAdded {
        name: String,
        default: serde_json::Value,
        type_name: String,
    },
    FieldRemoved {
        name: String,
    },
    FieldRenamed {
        old: String,
        new: String,
    },
    FieldRetyped {
        name: String,
        new_type: String,
    },
}

impl SchemaEdit {
    pub fn field_added(
        schema: impl Into<SchemaId>,
        name: impl Into<String>,
        default: serde_json::Value,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            op: SchemaEditOp::FieldAdded {
                name: name.into(),
                default,
                type_name: type_name.into(),
            },
        }
    }

    pub fn field_removed(schema: impl Into<SchemaId>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            op: SchemaEditOp::FieldRemoved { name: name.into() },
        }
    }

    pub fn field_renamed(
        schema: impl Into<SchemaId>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            op: SchemaEditOp::FieldRenamed {
                old: old.into(),
                new: new.into(),
            },
        }
    }

    pub fn field_retyped(
        schema: impl Into<SchemaId>,
        name: impl Into<String>,
        new_type: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            op: SchemaEditOp::FieldRetyped {
                name: name.into(),
                new_type: new_type.into(),
            },
        }
    }
}

/// A declarative route change. Descriptive only.
#[derive(Debug, Clone)]
pub enum EndpointEdit {
    Added {
        path: String,
        method: Method,
    },
    Removed {
        path: String,
        method: Method,
    },
    Changed {
        path: String,
        method: Method,
        old_path: Option<String>,
        old_method: Option<Method>,
    },
}

impl EndpointEdit {
    pub fn endpoint_added(path: impl Into<String>, method: Method) -> Self {
        Self::Added {
            path: path.into(),
            method,
        }
    }

    pub fn endpoint_removed(path: impl Into<String>, method: Method) -> Self {
        Self::Removed {
            path: path.into(),
            method,
        }
    }

    pub fn endpoint_changed(
        path: impl Into<String>,
        method: Method,
        old_path: Option<String>,
        old_method: Option<Method>,
    ) -> Self {
        Self::Changed {
            path: path.into(),
            method,
            old_path,
            old_method,
        }
    }
}

/// A declarative add/remove of enum members. Descriptive only.
#[derive(Debug, Clone)]
pub enum EnumEdit {
    MembersAdded {
        enum_name: String,
        members: Vec<String>,
    },
    MembersRemoved {
        enum_name: String,
        members: Vec<String>,
    },
}

/// One instruction in a [`VersionChange`](crate::change::VersionChange). A closed tagged
/// variant: the engine never extends this set at runtime.
#[derive(Clone)]
pub enum Instruction {
    AlterRequest(AlterRequest),
    AlterResponse(AlterResponse),
    SchemaEdit(SchemaEdit),
    EndpointEdit(EndpointEdit),
    EnumEdit(EnumEdit),
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlterRequest(i) => f.debug_tuple("AlterRequest").field(i).finish(),
            Self::AlterResponse(i) => f.debug_tuple("AlterResponse").field(i).finish(),
            Self::SchemaEdit(i) => f.debug_tuple("SchemaEdit").field(i).finish(),
            Self::EndpointEdit(i) => f.debug_tuple("EndpointEdit").field(i).finish(),
            Self::EnumEdit(i) => f.debug_tuple("EnumEdit").field(i).finish(),
        }
    }
}
