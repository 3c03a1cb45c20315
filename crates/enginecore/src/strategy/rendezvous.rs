//! Rendezvous (HRW) hashing. Stateless: every call recomputes scores, so
//! there is no index to rebuild or mark dirty.

use crate::node::NodeId;
use crate::registry::NodeRegistry;

pub fn locate(registry: &NodeRegistry, key: &[u8], seed: u64, max_replicas: usize) -> Vec<NodeId> {
    if max_replicas == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(u64, NodeId)> = registry
        .iter()
        .filter(|n| n.state.is_placement_eligible())
        .map(|n| (crate::hash::hash_key_node(key, n.id.0, seed), n.id))
        .collect();
    // Highest score wins; ties broken by node id for determinism.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().take(max_replicas).map(|(_, id)| id).collect()
}
