//! One adjacent-version step: a bundle of instructions plus the indices needed to apply
//! them quickly during request/response translation.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    carrier::{RequestInfo, ResponseInfo},
    error::{ConfigError, MigrationFailure, RouteBindingError},
    instruction::{AlterRequest, AlterResponse, Instruction, RouteId, SchemaId, Selector},
    version::Version,
};

/// Indices into a change's `instructions` for a given `AlterRequest`/`AlterResponse` kind.
#[derive(Debug, Default, Clone)]
struct Indices {
    by_schema: HashMap<SchemaId, Vec<usize>>,
    by_path: HashMap<String, Vec<usize>>,
    by_route: HashMap<RouteId, Vec<usize>>,
}

#[derive(Debug, Default, Clone)]
struct RouteBinding {
    /// Every distinct path template declared by a path-indexed instruction.
    declared: std::collections::HashSet<String>,
    /// Paths that have been bound to at least one route.
    bound: std::collections::HashSet<String>,
}

/// A single adjacent-version migration step: `from_version -> to_version`, plus the
/// instructions that describe the difference between them.
#[derive(Debug)]
pub struct VersionChange {
    pub description: String,
    pub from_version: Version,
    pub to_version: Version,
    pub hidden_from_changelog: bool,
    instructions: Vec<Instruction>,
    request_indices: Indices,
    response_indices: Indices,
    route_binding: RouteBinding,
}

impl VersionChange {
    /// Build a version change from its adjacent version pair and instruction list.
    ///
    /// Fails with [`ConfigError::AmbiguousSelector`] if any `AlterRequest`/`AlterResponse`
    /// instruction selects both schemas and a path, or neither; fails with
    /// [`ConfigError::NotIncreasing`] if `from_version` is not strictly less than
    /// `to_version`.
    pub fn new(
        description: impl Into<String>,
        from_version: Version,
        to_version: Version,
        instructions: Vec<Instruction>,
    ) -> Result<Self, ConfigError> {
        if from_version >= to_version {
            return Err(ConfigError::NotIncreasing(
                from_version.as_str().to_string(),
                to_version.as_str().to_string(),
            ));
        }

        let mut request_indices = Indices::default();
        let mut response_indices = Indices::default();
        let mut route_binding = RouteBinding::default();

        for (i, instruction) in instructions.iter().enumerate() {
            match instruction {
                Instruction::AlterRequest(AlterRequest { selector, .. }) => {
                    index_selector(selector, i, &mut request_indices)?;
                    if let Some(path) = selector.path_template() {
                        route_binding.declared.insert(path.to_string());
                    }
                }
                Instruction::AlterResponse(AlterResponse { selector, .. }) => {
                    index_selector(selector, i, &mut response_indices)?;
                    if let Some(path) = selector.path_template() {
                        route_binding.declared.insert(path.to_string());
                    }
                }
                Instruction::SchemaEdit(_)
                | Instruction::EndpointEdit(_)
                | Instruction::EnumEdit(_) => {}
            }
        }

        Ok(Self {
            description: description.into(),
            from_version,
            to_version,
            hidden_from_changelog: false,
            instructions,
            request_indices,
            response_indices,
            route_binding,
        })
    }

    /// Hide this change from changelog-rendering collaborators (does not affect translation).
    pub fn hidden(mut self) -> Self {
        self.hidden_from_changelog = true;
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Bind a path-indexed instruction to a concrete route, so it becomes active for that
    /// route's requests/responses. Called once per registered route by the
    /// [`RouteBinder`](crate::route::RouteBinder). Only instructions whose declared method
    /// set contains `method` (or declare no methods at all) are bound.
    pub fn bind_route(&mut self, route_id: RouteId, method: &axum::http::Method, path: &str) {
        let mut bound = false;
        for (i, instruction) in self.instructions.iter().enumerate() {
            match instruction {
                Instruction::AlterRequest(AlterRequest { selector, .. }) => {
                    if selector.matches_route(method, path) {
                        self.request_indices
                            .by_route
                            .entry(route_id)
                            .or_default()
                            .push(i);
                        bound = true;
                    }
                }
                Instruction::AlterResponse(AlterResponse { selector, .. }) => {
                    if selector.matches_route(method, path) {
                        self.response_indices
                            .by_route
                            .entry(route_id)
                            .or_default()
                            .push(i);
                        bound = true;
                    }
                }
                _ => {}
            }
        }
        if bound {
            self.route_binding.bound.insert(path.to_string());
        }
    }

    /// Path-indexed instructions that were never bound to any route. Surfaced by the
    /// [`RouteBinder`](crate::route::RouteBinder) as non-fatal startup warnings.
    pub fn unbound_paths(&self) -> Vec<RouteBindingError> {
        self.route_binding
            .declared
            .difference(&self.route_binding.bound)
            .map(|path| RouteBindingError { path: path.clone() })
            .collect()
    }

    /// Apply every schema-matched `AlterRequest` for `body_type`, then every route-matched
    /// `AlterRequest` for `route_id`, in declaration order within each group.
    pub fn migrate_request(
        &self,
        request: &mut RequestInfo,
        body_type: Option<&SchemaId>,
        route_id: Option<RouteId>,
    ) -> Result<(), MigrationFailure> {
        for i in self.matching_indices(&self.request_indices, body_type, route_id) {
            if let Instruction::AlterRequest(AlterRequest { transform, .. }) = &self.instructions[i]
            {
                (transform)(request).map_err(|source| MigrationFailure {
                    change: self.description.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Apply every schema-matched `AlterResponse` for `body_type`, then every route-matched
    /// `AlterResponse` for `route_id`, skipping instructions with `migrate_http_errors == false`
    /// when `response.status >= 300`.
    pub fn migrate_response(
        &self,
        response: &mut ResponseInfo,
        body_type: Option<&SchemaId>,
        route_id: Option<RouteId>,
    ) -> Result<(), MigrationFailure> {
        let is_error = response.status.as_u16() >= 300;
        for i in self.matching_indices(&self.response_indices, body_type, route_id) {
            if let Instruction::AlterResponse(AlterResponse {
                transform,
                migrate_http_errors,
                ..
            }) = &self.instructions[i]
            {
                if is_error && !migrate_http_errors {
                    debug!(
                        change = %self.description,
                        status = response.status.as_u16(),
                        "skipping response instruction: error status and migrate_http_errors=false"
                    );
                    continue;
                }
                (transform)(response).map_err(|source| MigrationFailure {
                    change: self.description.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn matching_indices(
        &self,
        indices: &Indices,
        body_type: Option<&SchemaId>,
        route_id: Option<RouteId>,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        if let Some(schema) = body_type {
            if let Some(idxs) = indices.by_schema.get(schema) {
                out.extend(idxs.iter().copied());
            }
        }
        if let Some(route_id) = route_id {
            if let Some(idxs) = indices.by_route.get(&route_id) {
                out.extend(idxs.iter().copied());
            }
        }
        // Schema-matched instructions must run before route-matched ones, so dedup in place
        // rather than sorting: sorting by index would reorder the two groups back into
        // declaration order and undo that guarantee.
        let mut seen = std::collections::HashSet::with_capacity(out.len());
        out.retain(|i| seen.insert(*i));
        out
    }
}

fn index_selector(
    selector: &Selector,
    i: usize,
    indices: &mut Indices,
) -> Result<(), ConfigError> {
    match selector {
        Selector::Schemas(schemas) => {
            if schemas.is_empty() {
                return Err(ConfigError::AmbiguousSelector);
            }
            for schema in schemas {
                indices.by_schema.entry(schema.clone()).or_default().push(i);
            }
        }
        Selector::Path { path, .. } => {
            if path.is_empty() {
                return Err(ConfigError::AmbiguousSelector);
            }
            indices.by_path.entry(path.clone()).or_default().push(i);
        }
    }
    Ok(())
}
