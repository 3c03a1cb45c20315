//! Virtual node placement on the Ketama ring.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Controls how many virtual nodes a node gets and (optionally) forces them
/// into distinct ring segments.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VnodeConfig {
    pub multiplier: u32,
    pub min_vnodes_per_node: u32,
    pub max_vnodes_per_node: u32,
    pub replica_point_spread: bool,
}

impl Default for VnodeConfig {
    fn default() -> Self {
        Self {
            multiplier: 160,
            min_vnodes_per_node: 1,
            max_vnodes_per_node: 10_000,
            replica_point_spread: false,
        }
    }
}

pub(crate) fn vnode_count_for(weight: u32, cfg: &VnodeConfig) -> u32 {
    let raw = (weight as u64) * (cfg.multiplier as u64);
    raw.clamp(cfg.min_vnodes_per_node as u64, cfg.max_vnodes_per_node as u64) as u32
}

/// A single point on the Ketama ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNode {
    pub hash_point: u64,
    pub node_id: NodeId,
    pub vnode_index: u32,
}

impl VirtualNode {
    pub(crate) fn order_key(&self) -> (u64, NodeId, u32) {
        (self.hash_point, self.node_id, self.vnode_index)
    }
}

pub(crate) fn hash_point(node_id: u64, index: u32, total: u32, seed: u64, spread: bool) -> u64 {
    let h = crate::hash::hash_node_vnode(node_id, index, seed);
    if spread && total > 0 {
        let segment = u64::MAX / (total as u64);
        let segment = segment.max(1);
        let base = segment.saturating_mul(index as u64);
        base.saturating_add(h % segment)
    } else {
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vnode_count_respects_multiplier_and_bounds() {
        let cfg = VnodeConfig::default();
        assert_eq!(vnode_count_for(1, &cfg), 160);
        assert_eq!(vnode_count_for(2, &cfg), 320);

        let cfg = VnodeConfig { min_vnodes_per_node: 50, ..VnodeConfig::default() };
        assert_eq!(vnode_count_for(0, &cfg), 50);

        let cfg = VnodeConfig { max_vnodes_per_node: 100, ..VnodeConfig::default() };
        assert_eq!(vnode_count_for(10, &cfg), 100);
    }

    #[test]
    fn spread_keeps_each_index_in_its_own_segment() {
        let total = 8;
        let mut points = Vec::new();
        for i in 0..total {
            points.push(hash_point(1, i, total, 0, true));
        }
        let segment = u64::MAX / (total as u64);
        for (i, p) in points.iter().enumerate() {
            let lower = segment.saturating_mul(i as u64);
            let upper = segment.saturating_mul(i as u64 + 1);
            assert!(*p >= lower && *p < upper || i as u64 == total as u64 - 1);
        }
    }
}
