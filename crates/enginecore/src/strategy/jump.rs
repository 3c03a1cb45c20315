//! Jump consistent hash: the canonical Lamping & Veach algorithm, shaped
//! after `hash-rings`'s `jump` module.

use crate::node::NodeId;
use crate::registry::NodeRegistry;
use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct JumpIndex {
    pub(crate) buckets: Vec<NodeId>,
    pub(crate) dirty: bool,
}

impl JumpIndex {
    pub fn new() -> Self {
        Self { buckets: Vec::new(), dirty: true }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn buckets(&self) -> &[NodeId] {
        &self.buckets
    }

    /// Incrementally reconciles `self.buckets` against the registry's
    /// current eligible membership instead of rebuilding from a fresh sort.
    /// Jump hash's minimal-movement guarantee only holds across a change in
    /// bucket *count*: shrinking from `n` to `n-1` reassigns only the keys
    /// that resolved to index `n-1`. A global id-sort would renumber every
    /// node whose id falls after the changed one, moving far more keys than
    /// that guarantee promises. Instead: newly-eligible nodes are appended
    /// (preserving everyone else's index), and a removed node's slot is
    /// filled by swapping in whatever currently occupies the last slot, then
    /// truncating — so only the removed node's own keys and the keys that
    /// happened to live in the last slot ever move.
    pub fn rebuild(&mut self, registry: &NodeRegistry) {
        if !self.dirty {
            return;
        }
        let eligible: HashSet<NodeId> =
            registry.iter().filter(|n| n.state.is_placement_eligible()).map(|n| n.id).collect();

        let mut index_of: std::collections::HashMap<NodeId, usize> =
            self.buckets.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut i = 0;
        while i < self.buckets.len() {
            let id = self.buckets[i];
            if eligible.contains(&id) {
                i += 1;
                continue;
            }
            let last = self.buckets.len() - 1;
            self.buckets.swap(i, last);
            index_of.insert(self.buckets[i], i);
            self.buckets.pop();
            index_of.remove(&id);
            // Don't advance `i`: the node swapped into this slot still needs
            // to be checked (it may also be ineligible).
        }

        let mut added: Vec<NodeId> = eligible.iter().copied().filter(|id| !index_of.contains_key(id)).collect();
        added.sort();
        for id in added {
            index_of.insert(id, self.buckets.len());
            self.buckets.push(id);
        }

        self.dirty = false;
    }

    pub fn locate(&self, key: &[u8], seed: u64, max_replicas: usize) -> Vec<NodeId> {
        if self.buckets.is_empty() || max_replicas == 0 {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut perturb: u64 = 0;
        let attempt_limit = (self.buckets.len() as u64).saturating_mul(8).max(8);
        while out.len() < max_replicas && perturb < attempt_limit {
            let h = crate::hash::hash64(key, seed.wrapping_add(perturb));
            let bucket = jump_consistent_hash(h, self.buckets.len() as i64) as usize;
            let node_id = self.buckets[bucket];
            if seen.insert(node_id) {
                out.push(node_id);
            }
            perturb += 1;
        }
        out
    }
}

/// Lamping & Veach's jump consistent hash: O(ln n), no storage.
fn jump_consistent_hash(mut key: u64, num_buckets: i64) -> i64 {
    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < num_buckets {
        b = j;
        key = key.wrapping_mul(2_862_933_555_777_941_757).wrapping_add(1);
        j = (((b + 1) as f64) * ((1i64 << 31) as f64 / (((key >> 33) + 1) as f64))) as i64;
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;

    fn registry_with(n: usize) -> NodeRegistry {
        let mut reg = NodeRegistry::new();
        for i in 0..n {
            reg.add(NodeConfig::new(NodeId(i as u64), format!("n{i}"), "addr"), 1).unwrap();
        }
        reg
    }

    #[test]
    fn single_bucket_always_returns_zero() {
        assert_eq!(jump_consistent_hash(12345, 1), 0);
    }

    #[test]
    fn bucket_is_in_range() {
        for k in 0..1000u64 {
            let b = jump_consistent_hash(k * 7919, 17);
            assert!((0..17).contains(&b));
        }
    }

    #[test]
    fn locate_is_deterministic() {
        let reg = registry_with(6);
        let mut idx = JumpIndex::new();
        idx.rebuild(&reg);
        assert_eq!(idx.locate(b"k", 3, 2), idx.locate(b"k", 3, 2));
    }

    #[test]
    fn removing_a_node_only_moves_a_fraction_of_keys() {
        let reg_before = registry_with(5);
        let mut before = JumpIndex::new();
        before.rebuild(&reg_before);

        let mut reg_after = registry_with(5);
        reg_after.remove(NodeId(4)).unwrap();
        let mut after = JumpIndex::new();
        after.rebuild(&reg_after);

        let mut moved = 0;
        let total = 500;
        for i in 0..total {
            let key = (i as u32).to_le_bytes();
            if before.locate(&key, 1, 1) != after.locate(&key, 1, 1) {
                moved += 1;
            }
        }
        assert!(moved * 2 < total);
    }

    #[test]
    fn removing_a_non_max_id_node_only_moves_a_fraction_of_keys() {
        let reg_before = registry_with(5);
        let mut before = JumpIndex::new();
        before.rebuild(&reg_before);

        let mut reg_after = registry_with(5);
        reg_after.remove(NodeId(1)).unwrap();
        let mut after = JumpIndex::new();
        after.rebuild(&reg_after);

        let mut moved = 0;
        let total = 500;
        for i in 0..total {
            let key = (i as u32).to_le_bytes();
            if before.locate(&key, 1, 1) != after.locate(&key, 1, 1) {
                moved += 1;
            }
        }
        assert!(moved * 2 < total, "moved {moved} of {total}, expected well under half");
    }

    #[test]
    fn incremental_rebuild_preserves_bucket_index_of_untouched_nodes() {
        let reg = registry_with(5);
        let mut idx = JumpIndex::new();
        idx.rebuild(&reg);
        let index_of_node_3 = idx.buckets.iter().position(|id| *id == NodeId(3)).unwrap();

        let mut reg_after = reg.clone();
        reg_after.remove(NodeId(1)).unwrap();
        idx.mark_dirty();
        idx.rebuild(&reg_after);

        assert_eq!(idx.buckets.len(), 4);
        assert_eq!(idx.buckets.iter().position(|id| *id == NodeId(3)), Some(index_of_node_3));
    }
}
