//! The quorum planner: turns an already-resolved [`PlacementResult`] plus a
//! [`QuorumPolicy`] into a write-set and a read-set. Replica selection
//! itself is `enginecore`'s job; this crate only decides how many of those
//! replicas must ack, and in what order reads consult them. A node registry
//! is threaded through here (not into `enginecore::quorum`) because the
//! DC-aware levels (`LocalOne`, `LocalQuorum`, `EachQuorum`) need to look up
//! each replica's datacenter, and only this crate has a registry reference
//! alongside the placement.

use crate::error::{ReplicationError, Result};
use enginecore::{ConsistencyLevel, NodeId, NodeRegistry, PlacementResult, QuorumPolicy};
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSet {
    pub targets: Vec<NodeId>,
    /// How many of `targets` (the leading ones) must ack before the write
    /// is considered durable.
    pub sync_required: usize,
    /// The remaining targets, which may ack asynchronously.
    pub async_allowed: Vec<NodeId>,
    pub suggested_timeout_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadSet {
    pub candidates: Vec<NodeId>,
    pub required_responses: usize,
    pub read_repair: bool,
}

pub struct QuorumPlanner;

impl QuorumPlanner {
    pub fn plan_write(placement: &PlacementResult, quorum: &QuorumPolicy, registry: &NodeRegistry) -> Result<WriteSet> {
        if placement.replicas.is_empty() {
            tracing::warn!(consistency = ?quorum.consistency, "write planning failed: placement carries no replicas");
            return Err(ReplicationError::NoTargets);
        }
        let (required, required_ids) = match quorum.write_quorum {
            Some(w) => (w.min(placement.replicas.len().max(1)), Vec::new()),
            None => resolve_required(quorum.consistency, placement, registry),
        };
        if required > placement.replicas.len() {
            tracing::warn!(
                required,
                available = placement.replicas.len(),
                consistency = ?quorum.consistency,
                "write quorum unreachable for this placement"
            );
            return Err(ReplicationError::QuorumUnreachable {
                required,
                available: placement.replicas.len(),
            });
        }
        let targets = reorder_with_required_first(&placement.replicas, &required_ids);
        let sync_required = required.max(1);
        let async_allowed = targets[sync_required..].to_vec();
        if !async_allowed.is_empty() {
            tracing::debug!(
                sync = sync_required,
                async_count = async_allowed.len(),
                "write split across synchronous and asynchronous targets"
            );
        }
        Ok(WriteSet {
            targets,
            sync_required,
            async_allowed,
            suggested_timeout_ms: timeout_for(quorum.consistency),
        })
    }

    pub fn plan_read(placement: &PlacementResult, quorum: &QuorumPolicy, registry: &NodeRegistry) -> Result<ReadSet> {
        if placement.replicas.is_empty() {
            tracing::warn!(consistency = ?quorum.consistency, "read planning failed: placement carries no replicas");
            return Err(ReplicationError::NoTargets);
        }
        let required = match quorum.read_quorum {
            Some(r) => r.min(placement.replicas.len()).max(1),
            None => resolve_required(quorum.consistency, placement, registry).0.min(placement.replicas.len()).max(1),
        };
        Ok(ReadSet {
            candidates: placement.replicas.clone(),
            required_responses: required,
            read_repair: quorum.read_repair_enabled,
        })
    }
}

fn timeout_for(level: ConsistencyLevel) -> u64 {
    match level {
        ConsistencyLevel::All | ConsistencyLevel::EachQuorum => 5_000,
        ConsistencyLevel::Quorum | ConsistencyLevel::LocalQuorum => 2_000,
        ConsistencyLevel::One | ConsistencyLevel::LocalOne => 500,
    }
}

fn datacenter_of(registry: &NodeRegistry, id: NodeId) -> Option<u32> {
    registry.get(id).map(|n| n.location.datacenter)
}

/// Groups `ids` by datacenter, ordered by datacenter id for deterministic
/// iteration (the specific order doesn't matter for correctness, only that
/// it's stable across a test run).
fn group_by_datacenter(registry: &NodeRegistry, ids: &[NodeId]) -> BTreeMap<u32, Vec<NodeId>> {
    let mut groups: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
    for &id in ids {
        groups.entry(datacenter_of(registry, id).unwrap_or(0)).or_default().push(id);
    }
    groups
}

/// Resolves how many replicas must participate and, for the DC-aware
/// levels, exactly which ones — "local" is defined as the primary's own
/// datacenter. Returns `(required_count, required_ids)`; `required_ids` is
/// empty when the level doesn't care which specific replicas are chosen
/// (`Quorum`/`All`), since the caller's natural placement order already
/// puts the right number of replicas first.
fn resolve_required(level: ConsistencyLevel, placement: &PlacementResult, registry: &NodeRegistry) -> (usize, Vec<NodeId>) {
    match level {
        ConsistencyLevel::One => (1, vec![placement.primary]),
        ConsistencyLevel::Quorum | ConsistencyLevel::All => {
            (enginecore::level_quorum(level, placement.replicas.len()), Vec::new())
        }
        ConsistencyLevel::LocalOne => (1, vec![placement.primary]),
        ConsistencyLevel::LocalQuorum => {
            let local_dc = datacenter_of(registry, placement.primary);
            let local: Vec<NodeId> =
                placement.replicas.iter().copied().filter(|&id| datacenter_of(registry, id) == local_dc).collect();
            let required = enginecore::level_quorum(ConsistencyLevel::Quorum, local.len());
            (required, local.into_iter().take(required).collect())
        }
        ConsistencyLevel::EachQuorum => {
            let mut required_ids = Vec::new();
            let mut total = 0;
            for ids in group_by_datacenter(registry, &placement.replicas).into_values() {
                let required = enginecore::level_quorum(ConsistencyLevel::Quorum, ids.len());
                total += required;
                required_ids.extend(ids.into_iter().take(required));
            }
            (total, required_ids)
        }
    }
}

/// Reorders `replicas` so the explicitly-required ids come first (in the
/// order given), preserving the caller's relative order for everything
/// else. A no-op (returns `replicas` as-is) when `required_ids` is empty,
/// since the natural placement order already has the right prefix length.
fn reorder_with_required_first(replicas: &[NodeId], required_ids: &[NodeId]) -> Vec<NodeId> {
    if required_ids.is_empty() {
        return replicas.to_vec();
    }
    let required_set: HashSet<NodeId> = required_ids.iter().copied().collect();
    let mut out = required_ids.to_vec();
    out.extend(replicas.iter().copied().filter(|id| !required_set.contains(id)));
    out
}
