//! The placement resolver: the six-step locate algorithm and read-node
//! selection.

use crate::error::{EngineError, Result};
use crate::location::{apply_affinity, AffinityRule};
use crate::node::{Node, NodeId, NodeState};
use crate::registry::NodeRegistry;
use crate::strategy::{self, Strategy};
use crate::vnode::VnodeConfig;

#[derive(Clone, Debug)]
pub struct PlacementResult {
    pub primary: NodeId,
    pub replicas: Vec<NodeId>,
    pub healthy_count: u32,
    pub hash_value: u64,
    pub keyspace: Option<String>,
}

/// Steps: (1) hash the key, (2) oversample `2*replica_count` raw candidates
/// from the strategy, (3) filter ineligible states, (4) apply the affinity
/// predicate with repair, (5) truncate to `replica_count`, (6) build the
/// result. Returns `NoNodes` only when the final list is empty.
pub fn resolve_placement(
    strategy: &mut Strategy,
    registry: &NodeRegistry,
    seed: u64,
    vnode_cfg: &VnodeConfig,
    key: &[u8],
    replica_count: usize,
    affinity_rules: &[AffinityRule],
) -> Result<PlacementResult> {
    if registry.is_empty() {
        return Err(EngineError::NoNodes);
    }

    strategy::ensure_ready(strategy, registry, seed, vnode_cfg);

    let oversample = (replica_count * 2).max(replica_count).max(1);
    let raw = strategy::locate(strategy, registry, key, seed, oversample);

    let candidates: Vec<(NodeId, crate::location::Location)> = raw
        .into_iter()
        .filter_map(|id| registry.get(id).filter(|n| n.state.is_placement_eligible()).map(|n| (id, n.location)))
        .collect();

    let repaired = if affinity_rules.is_empty() || candidates.is_empty() {
        candidates.iter().map(|(id, _)| *id).collect()
    } else {
        apply_affinity(&candidates, replica_count.min(candidates.len()), affinity_rules)
    };

    let mut final_list = repaired;
    final_list.truncate(replica_count.max(1));

    if final_list.is_empty() {
        return Err(EngineError::NoNodes);
    }

    if final_list.len() < replica_count {
        tracing::warn!(
            requested = replica_count,
            got = final_list.len(),
            "placement degraded: fewer eligible replicas than requested"
        );
    }

    let hash_value = crate::hash::hash64(key, seed);
    Ok(PlacementResult {
        primary: final_list[0],
        replicas: final_list,
        healthy_count: registry.healthy_count(),
        hash_value,
        keyspace: None,
    })
}

/// Ranks `placement.replicas` for reads: state (Up > Suspect > Recovering,
/// everything else excluded in practice by scoring zero), reachability,
/// latency, error rate, then load.
pub fn select_read_node(registry: &NodeRegistry, placement: &PlacementResult) -> Option<NodeId> {
    placement
        .replicas
        .iter()
        .copied()
        .filter_map(|id| registry.get(id).map(|n| (id, n)))
        .max_by(|(_, a), (_, b)| read_score(a).partial_cmp(&read_score(b)).unwrap())
        .map(|(id, _)| id)
}

fn read_score(node: &Node) -> f64 {
    let state_score = match node.state {
        NodeState::Up => 3.0,
        NodeState::Suspect => 2.0,
        NodeState::Recovering => 1.0,
        _ => 0.0,
    };
    let reachability = if node.health.reachable { 1.0 } else { 0.0 };
    let latency_score = 1.0 / (1.0 + node.health.latency_ms as f64);
    let error_score = (1.0 - node.health.error_rate).max(0.0);
    let load_avg = (node.load.cpu_usage + node.load.memory_usage + node.load.disk_usage) / 3.0;
    let load_score = (1.0 - load_avg).max(0.0);

    state_score * 1000.0 + reachability * 100.0 + latency_score * 10.0 + error_score * 5.0 + load_score
}
