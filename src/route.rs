//! Binds path-indexed instructions to concrete, stable route identifiers once all routes
//! are registered.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use axum::http::Method;
use tracing::warn;

use crate::{chain::MigrationChain, instruction::RouteId};

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(0);

/// Assigns stable [`RouteId`]s to `(Method, path pattern)` pairs and binds every path-indexed
/// instruction in a [`MigrationChain`] to the routes that match its declared template.
///
/// Call [`RouteBinder::bind_all`] once at application bootstrap, after every handler has been
/// registered on the `axum::Router`.
#[derive(Debug, Default)]
pub struct RouteBinder {
    routes: HashMap<(Method, String), RouteId>,
}

impl RouteBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route and return its stable identifier. Calling this twice for the same
    /// `(method, pattern)` returns the same identifier both times.
    pub fn register(&mut self, method: Method, pattern: impl Into<String>) -> RouteId {
        let key = (method, pattern.into());
        *self
            .routes
            .entry(key)
            .or_insert_with(|| RouteId(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed)))
    }

    /// The route identifier for an already-registered `(method, pattern)` pair, if any.
    pub fn route_id(&self, method: &Method, pattern: &str) -> Option<RouteId> {
        self.routes
            .iter()
            .find(|((m, p), _)| m == method && p == pattern)
            .map(|(_, id)| *id)
    }

    /// Bind every path-indexed instruction across `chain` to the routes registered on this
    /// binder. Logs (but does not fail on) path templates that matched no registered route.
    pub fn bind_all(&self, chain: &mut MigrationChain) {
        for change in chain.changes_mut() {
            for ((method, pattern), route_id) in &self.routes {
                change.bind_route(*route_id, method, pattern);
            }
            for unbound in change.unbound_paths() {
                warn!(path = %unbound.path, change = %change.description, "path-indexed instruction matched no registered route");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        change::VersionChange,
        instruction::{AlterRequest, Instruction, Selector},
        version::Version,
    };

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn registering_same_route_twice_is_stable() {
        let mut binder = RouteBinder::new();
        let a = binder.register(Method::GET, "/users/:id");
        let b = binder.register(Method::GET, "/users/:id");
        assert_eq!(a, b);
    }

    #[test]
    fn binds_path_instruction_to_registered_route() {
        let mut binder = RouteBinder::new();
        binder.register(Method::POST, "/users");

        let mut chain = MigrationChain::new(vec![VersionChange::new(
            "rename field",
            v("1.0.0"),
            v("2.0.0"),
            vec![Instruction::AlterRequest(AlterRequest::new(
                Selector::path("/users", [Method::POST]),
                |_| Ok(()),
            ))],
        )
        .unwrap()])
        .unwrap();

        binder.bind_all(&mut chain);
        assert!(chain.changes()[0].unbound_paths().is_empty());
    }

    #[test]
    fn reports_unbound_path_without_failing() {
        let binder = RouteBinder::new();
        let mut chain = MigrationChain::new(vec![VersionChange::new(
            "rename field",
            v("1.0.0"),
            v("2.0.0"),
            vec![Instruction::AlterRequest(AlterRequest::new(
                Selector::path("/ghost", [Method::POST]),
                |_| Ok(()),
            ))],
        )
        .unwrap()])
        .unwrap();

        binder.bind_all(&mut chain);
        assert_eq!(chain.changes()[0].unbound_paths().len(), 1);
    }
}
