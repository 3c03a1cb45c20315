//! Maglev consistent hashing: a precomputed lookup table built from
//! per-node permutations, rebuilt lazily on topology change.

use crate::node::NodeId;
use crate::registry::NodeRegistry;
use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct MaglevIndex {
    pub(crate) table: Vec<NodeId>,
    pub(crate) dirty: bool,
}

impl MaglevIndex {
    pub fn new() -> Self {
        Self { table: Vec::new(), dirty: true }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn table(&self) -> &[NodeId] {
        &self.table
    }

    pub fn rebuild(&mut self, registry: &NodeRegistry, seed: u64) {
        if !self.dirty {
            return;
        }
        let nodes: Vec<NodeId> = registry
            .iter()
            .filter(|n| n.state.is_placement_eligible())
            .map(|n| n.id)
            .collect();
        if nodes.is_empty() {
            self.table.clear();
            self.dirty = false;
            return;
        }

        let m = next_prime((nodes.len() as u64) * 101);
        let offsets: Vec<u64> = nodes.iter().map(|n| crate::hash::hash_node_seed(n.0, seed) % m).collect();
        let skips: Vec<u64> = nodes
            .iter()
            .map(|n| 1 + crate::hash::hash_node_seed(n.0, seed.wrapping_add(0x9E37_79B9)) % (m - 1))
            .collect();

        let mut table: Vec<i64> = vec![-1; m as usize];
        let mut next = vec![0u64; nodes.len()];
        let mut filled = 0u64;
        let mut i = 0usize;
        while filled < m {
            let n_idx = i % nodes.len();
            let mut c = next[n_idx];
            let mut slot = (offsets[n_idx] + c * skips[n_idx]) % m;
            while table[slot as usize] != -1 {
                c += 1;
                slot = (offsets[n_idx] + c * skips[n_idx]) % m;
            }
            table[slot as usize] = n_idx as i64;
            next[n_idx] = c + 1;
            filled += 1;
            i += 1;
        }

        self.table = table.into_iter().map(|idx| nodes[idx as usize]).collect();
        self.dirty = false;
    }

    pub fn locate(&self, key: &[u8], seed: u64, max_replicas: usize) -> Vec<NodeId> {
        if self.table.is_empty() || max_replicas == 0 {
            return Vec::new();
        }
        let h = crate::hash::hash64(key, seed);
        let start = (h % self.table.len() as u64) as usize;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for step in 0..self.table.len() {
            let idx = (start + step) % self.table.len();
            let node_id = self.table[idx];
            if seen.insert(node_id) {
                out.push(node_id);
                if out.len() >= max_replicas {
                    break;
                }
            }
        }
        out
    }
}

fn next_prime(mut n: u64) -> u64 {
    if n < 2 {
        n = 2;
    }
    while !is_prime(n) {
        n += 1;
    }
    n
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}
