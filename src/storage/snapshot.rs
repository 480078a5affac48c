use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::models::{ResourceRef, Secret, Upstream, UpstreamGroup};
use super::StorageError;

/// On-disk shape of a snapshot: flat resource lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotResources {
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
    #[serde(default)]
    pub upstream_groups: Vec<UpstreamGroup>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
}

/// Read-only, point-in-time view of the resources a translation pass looks up.
///
/// A snapshot is never mutated once built. Passes running on different workers
/// can share one instance by reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "SnapshotResources")]
pub struct Snapshot {
    upstreams: BTreeMap<ResourceRef, Upstream>,
    upstream_groups: BTreeMap<ResourceRef, UpstreamGroup>,
    secrets: BTreeMap<ResourceRef, Secret>,
}

impl From<SnapshotResources> for Snapshot {
    fn from(resources: SnapshotResources) -> Self {
        Snapshot::new(resources.upstreams, resources.upstream_groups, resources.secrets)
    }
}

impl Snapshot {
    pub fn new(
        upstreams: Vec<Upstream>,
        upstream_groups: Vec<UpstreamGroup>,
        secrets: Vec<Secret>,
    ) -> Self {
        Self {
            upstreams: upstreams
                .into_iter()
                .map(|u| (u.metadata.clone(), u))
                .collect(),
            upstream_groups: upstream_groups
                .into_iter()
                .map(|g| (g.metadata.clone(), g))
                .collect(),
            secrets: secrets
                .into_iter()
                .map(|s| (s.metadata.clone(), s))
                .collect(),
        }
    }

    pub fn find_upstream(&self, upstream: &ResourceRef) -> Result<&Upstream, StorageError> {
        self.upstreams
            .get(upstream)
            .ok_or_else(|| StorageError::not_found("Upstream", upstream))
    }

    pub fn find_upstream_group(&self, group: &ResourceRef) -> Result<&UpstreamGroup, StorageError> {
        self.upstream_groups
            .get(group)
            .ok_or_else(|| StorageError::not_found("UpstreamGroup", group))
    }

    pub fn find_secret(&self, secret: &ResourceRef) -> Result<&Secret, StorageError> {
        self.secrets
            .get(secret)
            .ok_or_else(|| StorageError::not_found("Secret", secret))
    }

    pub fn upstream_count(&self) -> usize {
        self.upstreams.len()
    }

    pub fn upstream_group_count(&self) -> usize {
        self.upstream_groups.len()
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }
}
