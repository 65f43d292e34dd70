//! Orders version changes and computes forward/reverse application plans between any two
//! versions in the chain.

use crate::{
    carrier::{RequestInfo, ResponseInfo},
    change::VersionChange,
    error::{ChainError, ConfigError, MigrateError},
    instruction::{RouteId, SchemaId},
    version::Version,
};

/// An ordered, contiguous sequence of [`VersionChange`]s: `changes[i].to_version ==
/// changes[i + 1].from_version` for every adjacent pair.
pub struct MigrationChain {
    changes: Vec<VersionChange>,
}

/// The selected sub-sequence of changes and direction for migrating between two versions.
enum Plan<'a> {
    /// Source and target are the same version; nothing to do.
    Identity,
    /// Apply `changes` with their *request* operation, in the given (ascending) order.
    Forward(Vec<&'a VersionChange>),
    /// Apply `changes` with their *response* operation, in the given (descending) order.
    Backward(Vec<&'a VersionChange>),
}

impl MigrationChain {
    /// Build a chain from a list of version changes. `changes` must already be sorted
    /// ascending by `from_version`; this is verified, along with contiguity, at construction.
    pub fn new(changes: Vec<VersionChange>) -> Result<Self, ConfigError> {
        for pair in changes.windows(2) {
            let [a, b] = pair else { unreachable!() };
            if a.to_version != b.from_version {
                return Err(ConfigError::NonContiguousChain(
                    a.from_version.as_str().to_string(),
                    a.to_version.as_str().to_string(),
                    b.from_version.as_str().to_string(),
                    b.to_version.as_str().to_string(),
                ));
            }
        }

        // The baseline (the chain's oldest `from_version`) must never also be a `to_version`:
        // that would mean some change introduces it, contradicting it being the oldest, and
        // would fold the chain back on itself.
        if let Some(first) = changes.first() {
            let baseline = &first.from_version;
            if changes.iter().any(|c| &c.to_version == baseline) {
                return Err(ConfigError::BaselineHasInstructions(
                    baseline.as_str().to_string(),
                ));
            }
        }

        Ok(Self { changes })
    }

    pub fn changes(&self) -> &[VersionChange] {
        &self.changes
    }

    /// Mutable access to the chain's version changes, used by the
    /// [`RouteBinder`](crate::route::RouteBinder) to bind path-indexed instructions.
    pub fn changes_mut(&mut self) -> &mut [VersionChange] {
        &mut self.changes
    }

    fn plan<'a>(&'a self, from: &Version, to: &Version) -> Result<Plan<'a>, ChainError> {
        if from == to {
            return Ok(Plan::Identity);
        }

        let path_error = || ChainError::NoMigrationPath {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        };

        if from < to {
            // Forward: every change whose interval is covered by [from, to).
            let start = self
                .changes
                .iter()
                .position(|c| &c.from_version == from)
                .ok_or_else(path_error)?;
            let mut selected = Vec::new();
            let mut cursor = from.clone();
            for change in &self.changes[start..] {
                if &change.from_version != &cursor {
                    break;
                }
                if &cursor >= to {
                    break;
                }
                selected.push(change);
                cursor = change.to_version.clone();
                if &cursor == to {
                    break;
                }
            }
            if selected.is_empty() || &cursor != to {
                return Err(path_error());
            }
            Ok(Plan::Forward(selected))
        } else {
            // Backward: every change whose interval is covered by [to, from), applied in
            // descending (reverse-declaration) order.
            let end = self
                .changes
                .iter()
                .position(|c| &c.to_version == from)
                .ok_or_else(path_error)?;
            let mut selected = Vec::new();
            let mut cursor = from.clone();
            let mut idx = end;
            loop {
                let change = &self.changes[idx];
                if change.to_version != cursor {
                    break;
                }
                selected.push(change);
                cursor = change.from_version.clone();
                if cursor == *to {
                    break;
                }
                if idx == 0 {
                    break;
                }
                idx -= 1;
            }
            if selected.is_empty() || cursor != *to {
                return Err(path_error());
            }
            Ok(Plan::Backward(selected))
        }
    }

    /// Migrate a request forward from `from` to `to` (typically `to == HEAD`).
    pub fn apply_request(
        &self,
        request: &mut RequestInfo,
        from: &Version,
        to: &Version,
        body_type: Option<&SchemaId>,
        route_id: Option<RouteId>,
    ) -> Result<(), MigrateError> {
        match self.plan(from, to)? {
            Plan::Identity => Ok(()),
            Plan::Forward(changes) => {
                for change in changes {
                    change.migrate_request(request, body_type, route_id)?;
                }
                Ok(())
            }
            Plan::Backward(_) => unreachable!("apply_request only ever computes a forward plan"),
        }
    }

    /// Migrate a response backward from `from` (typically HEAD) to `to` (the client's version).
    pub fn apply_response(
        &self,
        response: &mut ResponseInfo,
        from: &Version,
        to: &Version,
        body_type: Option<&SchemaId>,
        route_id: Option<RouteId>,
    ) -> Result<(), MigrateError> {
        match self.plan(from, to)? {
            Plan::Identity => Ok(()),
            Plan::Backward(changes) => {
                for change in changes {
                    change.migrate_response(response, body_type, route_id)?;
                }
                Ok(())
            }
            Plan::Forward(_) => unreachable!("apply_response only ever computes a backward plan"),
        }
    }
}
